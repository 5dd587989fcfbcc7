use async_trait::async_trait;
use chartcore::{BranchLabel, Flowchart, GraphError, Node, NodeKind, RunError, Value};
use chartruntime::{Controller, FlowIo, RunConfig, RunOutcome, Speed};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Test I/O bridge: captures the log and highlight trail, serves input
/// from a channel so tests can script or delay user responses.
struct TestIo {
    log: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    highlights: Mutex<Vec<Option<String>>>,
    inputs: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

#[async_trait]
impl FlowIo for TestIo {
    fn log(&self, message: &str) {
        self.log.lock().unwrap().push(message.to_string());
    }

    async fn request_input(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.inputs.lock().await.recv().await {
            Some(value) => value,
            // Channel closed: stay pending forever, like a user who
            // never answers
            None => std::future::pending().await,
        }
    }

    fn set_highlight(&self, node_id: Option<&str>) {
        self.highlights
            .lock()
            .unwrap()
            .push(node_id.map(|id| id.to_string()));
    }
}

fn test_io() -> (Arc<TestIo>, mpsc::UnboundedSender<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let io = Arc::new(TestIo {
        log: Mutex::new(Vec::new()),
        prompts: Mutex::new(Vec::new()),
        highlights: Mutex::new(Vec::new()),
        inputs: tokio::sync::Mutex::new(rx),
    });
    (io, tx)
}

fn instant() -> RunConfig {
    RunConfig::with_speed(Speed::Instant)
}

fn controller(chart: Flowchart, io: Arc<TestIo>, config: RunConfig) -> Arc<Controller> {
    Arc::new(Controller::new(chart, io, config))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

fn hello_world_chart() -> Flowchart {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("out", NodeKind::Output).with_expression("\"Hello World\""));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "out");
    chart.connect("out", "end");
    chart
}

/// Start -> i=1 -> Decision(i<=5) -[true]-> Output(i) -> i=i+1 -> back
/// to the Decision; -[false]-> End.
fn counter_chart() -> Flowchart {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("init", NodeKind::Process).with_expression("i = 1"));
    chart.add_node(Node::new("check", NodeKind::Decision).with_condition("i <= 5"));
    chart.add_node(Node::new("print", NodeKind::Output).with_expression("i"));
    chart.add_node(Node::new("inc", NodeKind::Process).with_expression("i = i + 1"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "init");
    chart.connect("init", "check");
    chart.connect_branch("check", BranchLabel::True, "print");
    chart.connect("print", "inc");
    chart.connect("inc", "check");
    chart.connect_branch("check", BranchLabel::False, "end");
    chart
}

fn input_echo_chart() -> Flowchart {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("ask", NodeKind::Input).with_variable("n"));
    chart.add_node(Node::new("echo", NodeKind::Output).with_expression("n"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "ask");
    chart.connect("ask", "echo");
    chart.connect("echo", "end");
    chart
}

#[tokio::test]
async fn linear_program_completes_with_its_output() {
    let (io, _tx) = test_io();
    let ctl = controller(hello_world_chart(), io.clone(), instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.output, vec!["Hello World"]);
    assert!(!state.is_running);
    assert_eq!(state.current_node_id, None);
    assert!(io
        .log
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "Execution finished."));
}

#[tokio::test]
async fn counter_loop_prints_one_through_five() {
    let (io, _tx) = test_io();
    let ctl = controller(counter_chart(), io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.output, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(state.variables.get("i"), Some(&Value::Number(6.0)));
}

#[tokio::test]
async fn repeated_runs_are_deterministic() {
    let (io, _tx) = test_io();
    let ctl = controller(counter_chart(), io, instant());

    let first = ctl.start().await.unwrap();
    let second = ctl.start().await.unwrap();

    assert_eq!(first.output, second.output);
    assert_eq!(first.variables, second.variables);
    assert_eq!(first.outcome, second.outcome);
}

#[tokio::test]
async fn missing_start_rejects_before_any_output() {
    let mut chart = hello_world_chart();
    chart.nodes.retain(|n| n.kind != NodeKind::Start);
    let (io, _tx) = test_io();
    let ctl = controller(chart, io, instant());

    let err = ctl.start().await.unwrap_err();

    assert!(matches!(
        err,
        RunError::Graph(GraphError::MissingStart)
    ));
    let state = ctl.state();
    assert!(state.output.is_empty());
    assert!(state.error.is_some());
    assert!(!state.is_running);
}

#[tokio::test]
async fn input_is_coerced_to_a_number() {
    let (io, tx) = test_io();
    tx.send("42".to_string()).unwrap();
    let ctl = controller(input_echo_chart(), io.clone(), instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.variables.get("n"), Some(&Value::Number(42.0)));
    assert_eq!(state.output, vec!["42"]);
    assert_eq!(
        io.prompts.lock().unwrap().as_slice(),
        ["Enter value for n:"]
    );
}

#[tokio::test]
async fn non_numeric_input_stays_a_string() {
    let (io, tx) = test_io();
    tx.send("hello".to_string()).unwrap();
    let ctl = controller(input_echo_chart(), io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(
        state.variables.get("n"),
        Some(&Value::Str("hello".to_string()))
    );
}

#[tokio::test]
async fn while_loop_guard_trips_after_the_configured_cap() {
    // Start -> n=0 -> While(1 > 0) -[true]-> n=n+1 -> back; the
    // condition never turns false so the guard has to fire.
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("init", NodeKind::Process).with_expression("n = 0"));
    chart.add_node(Node::new("loop", NodeKind::While).with_condition("1 > 0"));
    chart.add_node(Node::new("body", NodeKind::Process).with_expression("n = n + 1"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "init");
    chart.connect("init", "loop");
    chart.connect_branch("loop", BranchLabel::True, "body");
    chart.connect("body", "loop");
    chart.connect_branch("loop", BranchLabel::False, "end");

    let (io, _tx) = test_io();
    let config = RunConfig {
        loop_limit: 10,
        ..instant()
    };
    let ctl = controller(chart, io.clone(), config);

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Failed));
    let error = state.error.expect("error should be recorded");
    assert!(error.contains("loop limit exceeded"), "got: {}", error);
    // The body ran exactly `loop_limit` times before the guard fired
    assert_eq!(state.variables.get("n"), Some(&Value::Number(10.0)));
    assert!(io
        .log
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.starts_with("Error:")));
}

#[tokio::test]
async fn interleaved_loops_still_trip_the_guard() {
    // Two always-true While nodes whose true branches enter each other,
    // so neither body ever returns to the loop it came from through a
    // plain back edge. The iteration cap must still fail the run.
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("a", NodeKind::While).with_condition("1 > 0"));
    chart.add_node(Node::new("b", NodeKind::While).with_condition("1 > 0"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "a");
    chart.connect_branch("a", BranchLabel::True, "b");
    chart.connect_branch("b", BranchLabel::True, "a");
    chart.connect_branch("a", BranchLabel::False, "end");
    chart.connect_branch("b", BranchLabel::False, "end");

    let (io, _tx) = test_io();
    let config = RunConfig {
        loop_limit: 10,
        ..instant()
    };
    let ctl = controller(chart, io, config);

    let state = tokio::time::timeout(Duration::from_secs(2), ctl.start())
        .await
        .expect("run must terminate")
        .unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Failed));
    assert!(state
        .error
        .as_deref()
        .is_some_and(|e| e.contains("loop limit exceeded")));
}

#[tokio::test]
async fn while_loop_exits_through_the_false_branch() {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("init", NodeKind::Process).with_expression("i = 1"));
    chart.add_node(Node::new("loop", NodeKind::While).with_condition("i <= 3"));
    chart.add_node(Node::new("body", NodeKind::Process).with_expression("i = i + 1"));
    chart.add_node(Node::new("done", NodeKind::Output).with_expression("\"done\""));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "init");
    chart.connect("init", "loop");
    chart.connect_branch("loop", BranchLabel::True, "body");
    chart.connect("body", "loop");
    chart.connect_branch("loop", BranchLabel::False, "done");
    chart.connect("done", "end");

    let (io, _tx) = test_io();
    let ctl = controller(chart, io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.output, vec!["done"]);
    assert_eq!(state.variables.get("i"), Some(&Value::Number(4.0)));
}

#[tokio::test]
async fn for_loop_binds_and_steps_the_counter() {
    // The body's last node wires back into the For node; loop
    // completion unwinds without consulting an exit edge.
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("loop", NodeKind::For).with_loop("k", "1", "3", "1"));
    chart.add_node(Node::new("print", NodeKind::Output).with_expression("k"));
    chart.connect("start", "loop");
    chart.connect("loop", "print");
    chart.connect("print", "loop");

    let (io, _tx) = test_io();
    let ctl = controller(chart, io.clone(), instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.output, vec!["1", "2", "3"]);
    assert!(io
        .log
        .lock()
        .unwrap()
        .iter()
        .any(|l| l == "For loop finished."));
}

#[tokio::test]
async fn dead_end_halts_gracefully() {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("out", NodeKind::Output).with_expression("\"a\""));
    chart.connect("start", "out");

    let (io, _tx) = test_io();
    let ctl = controller(chart, io.clone(), instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert_eq!(state.output, vec!["a"]);
    assert!(state.error.is_none());
    assert!(io
        .log
        .lock()
        .unwrap()
        .iter()
        .any(|l| l.contains("no outgoing connection")));
}

#[tokio::test]
async fn missing_decision_branch_halts_without_error() {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("check", NodeKind::Decision).with_condition("1 > 2"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "check");
    chart.connect_branch("check", BranchLabel::True, "end");
    // No false branch

    let (io, _tx) = test_io();
    let ctl = controller(chart, io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Completed));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn evaluation_failure_is_reported_not_thrown() {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("bad", NodeKind::Output).with_expression("missing + 1"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "bad");
    chart.connect("bad", "end");

    let (io, _tx) = test_io();
    let ctl = controller(chart, io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Failed));
    assert!(state
        .error
        .as_deref()
        .is_some_and(|e| e.contains("unbound variable 'missing'")));
    assert!(state.output.is_empty());
}

#[tokio::test]
async fn invalid_assignment_fails_the_run() {
    let mut chart = Flowchart::new();
    chart.add_node(Node::new("start", NodeKind::Start));
    chart.add_node(Node::new("proc", NodeKind::Process).with_expression("just some text"));
    chart.add_node(Node::new("end", NodeKind::End));
    chart.connect("start", "proc");
    chart.connect("proc", "end");

    let (io, _tx) = test_io();
    let ctl = controller(chart, io, instant());

    let state = ctl.start().await.unwrap();

    assert_eq!(state.outcome, Some(RunOutcome::Failed));
    assert!(state
        .error
        .as_deref()
        .is_some_and(|e| e.contains("invalid assignment")));
}

#[tokio::test]
async fn stop_while_paused_kills_the_run_for_good() {
    let (io, _tx) = test_io();
    let config = RunConfig {
        step_delay: Duration::from_millis(200),
        ..RunConfig::default()
    };
    let ctl = controller(counter_chart(), io, config);

    let task = {
        let ctl = Arc::clone(&ctl);
        tokio::spawn(async move { ctl.start().await })
    };
    {
        let ctl = Arc::clone(&ctl);
        wait_until(move || ctl.state().is_running).await;
    }

    ctl.pause();
    assert!(ctl.state().is_paused);
    ctl.stop();
    ctl.resume(); // must not revive the run

    let state = task.await.unwrap().unwrap();
    assert_eq!(state.outcome, Some(RunOutcome::Stopped));
    assert_eq!(state.current_node_id, None);
    assert!(!state.is_running);
    // No further node was visited after the stop
    assert!(state.output.is_empty());
}

#[tokio::test]
async fn input_resolved_after_stop_is_discarded() {
    let (io, tx) = test_io();
    let ctl = controller(input_echo_chart(), io, instant());

    let task = {
        let ctl = Arc::clone(&ctl);
        tokio::spawn(async move { ctl.start().await })
    };
    {
        let ctl = Arc::clone(&ctl);
        wait_until(move || ctl.state().is_waiting_for_input).await;
    }

    ctl.stop();
    let state = task.await.unwrap().unwrap();
    assert_eq!(state.outcome, Some(RunOutcome::Stopped));

    // The user answers after the run died: the value must not land
    tx.send("99".to_string()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = ctl.state();
    assert!(state.variables.is_empty());
    assert!(state.output.is_empty());
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let (io, tx) = test_io();
    let ctl = controller(input_echo_chart(), io, instant());

    let task = {
        let ctl = Arc::clone(&ctl);
        tokio::spawn(async move { ctl.start().await })
    };
    {
        let ctl = Arc::clone(&ctl);
        wait_until(move || ctl.state().is_waiting_for_input).await;
    }

    let err = ctl.start().await.unwrap_err();
    assert!(matches!(err, RunError::AlreadyRunning));

    tx.send("1".to_string()).unwrap();
    let state = task.await.unwrap().unwrap();
    assert_eq!(state.outcome, Some(RunOutcome::Completed));
}

#[tokio::test]
async fn highlight_trail_follows_the_visit_order_and_clears() {
    let (io, _tx) = test_io();
    let ctl = controller(hello_world_chart(), io.clone(), instant());

    ctl.start().await.unwrap();

    let highlights = io.highlights.lock().unwrap().clone();
    assert_eq!(
        highlights,
        vec![
            Some("start".to_string()),
            Some("out".to_string()),
            Some("end".to_string()),
            None,
        ]
    );
}
