use crate::executor::{lock_state, Executor, SharedState};
use crate::{ExecutionState, FlowIo, RunOutcome};
use chartcore::{Flowchart, RunError};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Inter-step pacing presets from the editor's execution panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    Instant,
    Fast,
    #[default]
    Normal,
    Slow,
}

impl Speed {
    pub fn delay(&self) -> Duration {
        match self {
            Speed::Instant => Duration::ZERO,
            Speed::Fast => Duration::from_millis(100),
            Speed::Normal => Duration::from_millis(300),
            Speed::Slow => Duration::from_millis(800),
        }
    }
}

impl FromStr for Speed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instant" => Ok(Speed::Instant),
            "fast" => Ok(Speed::Fast),
            "normal" => Ok(Speed::Normal),
            "slow" => Ok(Speed::Slow),
            other => Err(format!("unknown speed '{}'", other)),
        }
    }
}

/// Per-run settings
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub step_delay: Duration,
    pub loop_limit: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            step_delay: Speed::Normal.delay(),
            loop_limit: 10_000,
        }
    }
}

impl RunConfig {
    pub fn with_speed(speed: Speed) -> Self {
        Self {
            step_delay: speed.delay(),
            ..Self::default()
        }
    }
}

/// Awaited between node visits: applies the pacing delay, suspends
/// while paused and observes cancellation. `resume()` wakes the loop
/// immediately through the watch channel instead of a poll tick.
pub(crate) struct StepGate {
    cancel: CancellationToken,
    paused: watch::Receiver<bool>,
    delay: Duration,
}

impl StepGate {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `false` when the run has been stopped.
    pub(crate) async fn wait_step(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        while *self.paused.borrow_and_update() {
            tracing::trace!("run paused, waiting for resume");
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = self.paused.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        !self.cancel.is_cancelled()
    }
}

/// Wraps the executor with run/pause/resume/stop semantics. One
/// controller owns one chart; `pause`, `resume` and `stop` may be
/// called from other tasks while `start` is in flight.
pub struct Controller {
    chart: Flowchart,
    io: Arc<dyn FlowIo>,
    config: RunConfig,
    state: SharedState,
    paused: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
}

impl Controller {
    pub fn new(chart: Flowchart, io: Arc<dyn FlowIo>, config: RunConfig) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            chart,
            io,
            config,
            state: Arc::new(Mutex::new(ExecutionState::default())),
            paused,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Snapshot of the current run state
    pub fn state(&self) -> ExecutionState {
        lock_state(&self.state).clone()
    }

    /// Run the chart from its Start node. Resolves with the final state
    /// on completion, stop, or failure; a missing Start node rejects
    /// before any step. Rejects with `AlreadyRunning` while a previous
    /// run is still active.
    pub async fn start(&self) -> Result<ExecutionState, RunError> {
        {
            let mut state = lock_state(&self.state);
            if state.is_running {
                return Err(RunError::AlreadyRunning);
            }
            *state = ExecutionState {
                is_running: true,
                ..ExecutionState::default()
            };
        }
        self.paused.send_replace(false);
        let token = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();

        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, nodes = self.chart.nodes.len(), "starting flowchart run");
        self.io.log("Execution started...");

        let mut gate = StepGate {
            cancel: token,
            paused: self.paused.subscribe(),
            delay: self.config.step_delay,
        };
        let mut executor = Executor::new(
            &self.chart,
            Arc::clone(&self.io),
            Arc::clone(&self.state),
            self.config.loop_limit,
        );
        let result = executor.run(&mut gate).await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(RunError::Graph(err)) => {
                self.io.log(&format!("Error: {}", err));
                let mut state = lock_state(&self.state);
                state.is_running = false;
                state.error = Some(err.to_string());
                return Err(RunError::Graph(err));
            }
            Err(err) => {
                // Fatal run errors are reported, never propagated as a
                // panic into the host
                self.io.log(&format!("Error: {}", err));
                lock_state(&self.state).error = Some(err.to_string());
                RunOutcome::Failed
            }
        };

        self.io.set_highlight(None);
        let final_state = {
            let mut state = lock_state(&self.state);
            state.is_running = false;
            state.is_paused = false;
            state.is_waiting_for_input = false;
            state.current_node_id = None;
            state.outcome = Some(outcome);
            state.clone()
        };
        tracing::info!(%run_id, ?outcome, "flowchart run finished");
        Ok(final_state)
    }

    /// Suspend the step loop after the current node finishes.
    pub fn pause(&self) {
        lock_state(&self.state).is_paused = true;
        self.paused.send_replace(true);
        tracing::debug!("run paused");
    }

    /// Wake a paused step loop immediately.
    pub fn resume(&self) {
        lock_state(&self.state).is_paused = false;
        self.paused.send_replace(false);
        tracing::debug!("run resumed");
    }

    /// Cooperatively cancel the run. Observed at the next suspension
    /// point; a pending input request is abandoned and its value
    /// discarded.
    pub fn stop(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
        {
            let mut state = lock_state(&self.state);
            state.is_running = false;
            state.is_paused = false;
            state.is_waiting_for_input = false;
            state.current_node_id = None;
        }
        self.io.set_highlight(None);
        tracing::debug!("run stopped");
    }
}
