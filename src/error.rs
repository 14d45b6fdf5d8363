//! Error types for queue construction and hand-off

/// Result type alias for queue construction
pub type Result<T> = std::result::Result<T, QueueError>;

/// Why a requested ring capacity was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CapacityViolation {
    /// Fewer than two slots
    #[error("buffer size too small")]
    TooSmall,
    /// More than [`MAX_CAPACITY`](crate::ring::MAX_CAPACITY) slots
    #[error("buffer size too large")]
    TooLarge,
    /// Slot count is not a power of two
    #[error("buffer size is not a power of 2")]
    NotPowerOfTwo,
}

/// Errors surfaced when a queue is misconfigured
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The ring cannot be built with the requested number of slots
    #[error("invalid capacity {requested}: {reason}")]
    InvalidCapacity {
        requested: usize,
        reason: CapacityViolation,
    },
}

/// A push was rejected because every slot is occupied.
///
/// The rejected record is handed back so the caller can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("queue is full")]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Recovers the record that could not be enqueued
    pub fn into_inner(self) -> T {
        self.0
    }
}
