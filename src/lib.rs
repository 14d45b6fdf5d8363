//! # handoff_queue_rs
//!
//! Queues for handing fixed-size records from producer threads to consumer
//! threads, terminated by a single end-of-stream record.
//!
//! Two implementations share the [`HandoffQueue`] contract:
//!
//! - [`RingBuffer`]: bounded, lock-free, per-slot sequence counters. `push`
//!   fails when full and `pop` fails when empty; neither ever blocks.
//! - [`BlockingQueue`]: unbounded, mutex and condition variable. `push`
//!   always succeeds and `pop` sleeps until a record arrives.
//!
//! ```
//! use handoff_queue_rs::{handoff, Message, RingBuffer};
//!
//! let ring = RingBuffer::new(8)?;
//! handoff::produce(&ring, [1u32, 2, 2].map(Message::Data));
//! let counts = handoff::count(&ring);
//! assert_eq!(counts[&Message::Data(2)], 2);
//! # Ok::<(), handoff_queue_rs::QueueError>(())
//! ```

mod common;
mod trace;

pub mod blocking;
pub mod config;
pub mod error;
pub mod handoff;
pub mod ring;

pub use blocking::BlockingQueue;
pub use config::{AnyQueue, DefaultQueue, QueueConfig, Strategy};
pub use error::{CapacityViolation, Full, QueueError, Result};
pub use ring::RingBuffer;
pub use trace::init_tracing;

/// A value that can travel through a hand-off queue
///
/// Every record type designates one terminator value that never occurs as
/// ordinary data. Consumers stop when they dequeue it and never see it as a
/// record.
pub trait Record: PartialEq + Sized + Send + 'static {
    /// The end-of-stream value for this type; the same value on every call
    fn terminator() -> Self;

    /// Whether `self` marks the end of the stream
    #[inline]
    fn is_terminator(&self) -> bool {
        *self == Self::terminator()
    }
}

/// Record wrapper with an explicit end-of-stream variant
///
/// Unlike the integer impls, no payload value can collide with the
/// terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Message<T> {
    Data(T),
    End,
}

impl<T> Message<T> {
    /// Returns the payload, or `None` for [`Message::End`]
    pub fn into_data(self) -> Option<T> {
        match self {
            Message::Data(value) => Some(value),
            Message::End => None,
        }
    }
}

impl<T: PartialEq + Send + 'static> Record for Message<T> {
    fn terminator() -> Self {
        Message::End
    }

    #[inline]
    fn is_terminator(&self) -> bool {
        matches!(self, Message::End)
    }
}

macro_rules! zero_terminated {
    ($($ty:ty),*) => {
        $(
            /// Zero is reserved as the terminator.
            impl Record for $ty {
                #[inline]
                fn terminator() -> Self {
                    0
                }
            }
        )*
    };
}

zero_terminated!(u8, u16, u32, u64, u128, usize);

/// Outcome of a single dequeue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recv<T> {
    /// A data record
    Data(T),
    /// Nothing available right now (lock-free queue only)
    Empty,
    /// The terminator was dequeued; the stream is over
    End,
}

/// The push/pop capability shared by both queue strategies
pub trait HandoffQueue<T: Record>: Send + Sync {
    /// Enqueues `record`, handing it back when the queue is full
    fn try_push(&self, record: T) -> std::result::Result<(), Full<T>>;

    /// Dequeues one record, distinguishing empty from ended
    fn recv(&self) -> Recv<T>;

    /// Best-effort emptiness snapshot; diagnostics only
    fn is_empty(&self) -> bool;

    /// Enqueues `record`.
    ///
    /// `false` means the queue is full and the record was dropped; the caller
    /// should retry with another copy or apply backpressure. The blocking
    /// queue always returns `true`.
    fn push(&self, record: T) -> bool {
        self.try_push(record).is_ok()
    }

    /// Dequeues one record into `out`.
    ///
    /// Returns `false` without touching `out` when nothing was delivered:
    /// either the terminator was consumed or (lock-free queue) the queue was
    /// momentarily empty. Use [`recv`](HandoffQueue::recv) to tell the two
    /// apart.
    fn pop(&self, out: &mut T) -> bool {
        match self.recv() {
            Recv::Data(record) => {
                *out = record;
                true
            }
            Recv::Empty | Recv::End => false,
        }
    }
}
