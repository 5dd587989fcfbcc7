use async_trait::async_trait;

/// The three callbacks supplied by the host UI.
///
/// The executor never calls these concurrently with itself and assumes
/// nothing about their latency; `request_input` in particular may stay
/// pending until the user reacts.
#[async_trait]
pub trait FlowIo: Send + Sync {
    /// Append a line to the run log. Fire-and-forget.
    fn log(&self, message: &str);

    /// Ask the host for a user-supplied value. Must resolve exactly once.
    async fn request_input(&self, prompt: &str) -> String;

    /// Report the active node for highlighting; `None` clears it.
    fn set_highlight(&self, node_id: Option<&str>);
}
