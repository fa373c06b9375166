/// Result of a successful handler invocation.
///
/// `NoOp` covers the expected races: the referenced entity has not
/// replicated yet, or the event is not addressed to this handler.
/// Neither is an error and neither may poison the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The side effect was applied.
    Applied,
    /// Nothing to do for this message.
    NoOp,
}

/// Typed handler failure. The runtime decides commit-vs-retry per
/// variant instead of swallowing a generic exception: recoverable
/// failures get a bounded in-place retry, fatal ones are logged and the
/// offset advances immediately. Either way the partition never stalls.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Transient failure (store unreachable, query timeout); retrying
    /// the same message may succeed.
    #[error("recoverable handler failure: {0}")]
    Recoverable(#[source] anyhow::Error),

    /// Contract violation that cannot succeed on retry.
    #[error("fatal handler failure: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl HandlerError {
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}
