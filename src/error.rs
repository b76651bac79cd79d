// src/error.rs

/// Programmer-misuse errors: the one class of error a caller is expected to
/// match on rather than just log. Everything else (transport, decode,
/// subscription-reject) is either fatal-and-local or logged-and-discarded,
/// per the propagation policy.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("listen* called before start()")]
    NotStarted,

    #[error("batch length mismatch: {symbols} symbols, {cbs} callbacks, {ctxs} contexts")]
    BatchLengthMismatch {
        symbols: usize,
        cbs: usize,
        ctxs: usize,
    },

    #[error("empty symbol")]
    EmptySymbol,

    #[error("invalid symbol {0:?}: expected canonical BASE-QUOTE form")]
    InvalidSymbol(String),
}

/// Write-queue allocation failure (§7 "OutOfMemory").
#[derive(Debug, thiserror::Error)]
#[error("failed to enqueue write: {0}")]
pub struct WriteQueueError(#[from] std::collections::TryReserveError);
