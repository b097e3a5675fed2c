use tokio_util::sync::CancellationToken;

/// Handed to every job run.
#[derive(Clone, Default)]
pub struct JobContext {
    /// Cancelled on shutdown; each run gets a child of the scheduler's token.
    pub cancellation_token: CancellationToken,
}

impl JobContext {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub(crate) fn child(&self) -> Self {
        Self::new(self.cancellation_token.child_token())
    }
}
