//! Queue strategy selection
//!
//! The composing application picks the lock-free ring or the blocking queue
//! either at build time through [`DefaultQueue`] (the `blocking` cargo
//! feature) or at run time through [`QueueConfig`].

use crate::error::{Full, Result};
use crate::ring::validate_capacity;
use crate::{BlockingQueue, HandoffQueue, Record, Recv, RingBuffer};

/// Ring capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 1024;

/// The queue selected by cargo features
#[cfg(not(feature = "blocking"))]
pub type DefaultQueue<T> = RingBuffer<T>;

/// The queue selected by cargo features
#[cfg(feature = "blocking")]
pub type DefaultQueue<T> = BlockingQueue<T>;

/// Waiting and failure policy of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Bounded ring; `push` fails when full, `pop` fails when empty
    LockFree,
    /// Unbounded deque; `push` never fails, `pop` sleeps until data arrives
    Blocking,
}

impl Default for Strategy {
    fn default() -> Self {
        if cfg!(feature = "blocking") {
            Strategy::Blocking
        } else {
            Strategy::LockFree
        }
    }
}

/// Builder for a queue of either strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    capacity: usize,
    strategy: Strategy,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            strategy: Strategy::default(),
        }
    }

    /// Ring slot count, or the initial reservation of the blocking queue
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_strategy(&self) -> Strategy {
        self.strategy
    }

    /// Checks the capacity against the ring's limits.
    ///
    /// The blocking queue accepts any capacity.
    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            Strategy::LockFree => validate_capacity(self.capacity),
            Strategy::Blocking => Ok(()),
        }
    }

    /// Builds the configured queue
    pub fn build<T>(&self) -> Result<AnyQueue<T>> {
        self.validate()?;
        Ok(match self.strategy {
            Strategy::LockFree => AnyQueue::LockFree(RingBuffer::new(self.capacity)?),
            Strategy::Blocking => AnyQueue::Blocking(BlockingQueue::with_capacity(self.capacity)),
        })
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A queue whose strategy was chosen at run time
pub enum AnyQueue<T> {
    LockFree(RingBuffer<T>),
    Blocking(BlockingQueue<T>),
}

impl<T> AnyQueue<T> {
    pub fn strategy(&self) -> Strategy {
        match self {
            AnyQueue::LockFree(_) => Strategy::LockFree,
            AnyQueue::Blocking(_) => Strategy::Blocking,
        }
    }
}

impl<T: Record> HandoffQueue<T> for AnyQueue<T> {
    fn try_push(&self, record: T) -> std::result::Result<(), Full<T>> {
        match self {
            AnyQueue::LockFree(q) => q.try_push(record),
            AnyQueue::Blocking(q) => HandoffQueue::try_push(q, record),
        }
    }

    fn recv(&self) -> Recv<T> {
        match self {
            AnyQueue::LockFree(q) => q.recv(),
            AnyQueue::Blocking(q) => q.recv(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AnyQueue::LockFree(q) => q.is_empty(),
            AnyQueue::Blocking(q) => q.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapacityViolation, QueueError};

    #[test]
    fn defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.get_capacity(), DEFAULT_CAPACITY);
        assert_eq!(config.get_strategy(), Strategy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lock_free_capacity_is_checked() {
        let config = QueueConfig::new().strategy(Strategy::LockFree).capacity(1000);
        assert_eq!(
            config.validate(),
            Err(QueueError::InvalidCapacity {
                requested: 1000,
                reason: CapacityViolation::NotPowerOfTwo,
            })
        );
        assert!(config.build::<u32>().is_err());
    }

    #[test]
    fn blocking_accepts_any_capacity() {
        let config = QueueConfig::new().strategy(Strategy::Blocking).capacity(1000);
        let queue = config.build::<u32>().unwrap();
        assert_eq!(queue.strategy(), Strategy::Blocking);
    }

    #[test]
    fn default_queue_follows_feature() {
        #[cfg(not(feature = "blocking"))]
        let queue: DefaultQueue<u32> = RingBuffer::new(DEFAULT_CAPACITY).unwrap();
        #[cfg(feature = "blocking")]
        let queue: DefaultQueue<u32> = BlockingQueue::with_capacity(DEFAULT_CAPACITY);

        assert!(queue.push(3));
        assert!(queue.push(0));
        let mut out = 0;
        assert!(queue.pop(&mut out));
        assert_eq!(out, 3);
        assert!(!queue.pop(&mut out));
    }

    #[test]
    fn built_queues_honour_contract() {
        for strategy in [Strategy::LockFree, Strategy::Blocking] {
            let queue = QueueConfig::new()
                .strategy(strategy)
                .capacity(4)
                .build::<u64>()
                .unwrap();
            assert_eq!(queue.strategy(), strategy);
            assert!(queue.push(11));
            assert!(queue.push(0));

            let mut out = 0;
            assert!(queue.pop(&mut out));
            assert_eq!(out, 11);
            assert!(!queue.pop(&mut out));
            assert!(queue.is_empty());
        }
    }
}
