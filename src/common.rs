//! Cursor state shared by the ring buffer
//!
//! The enqueue and dequeue cursors only ever grow (wrapping at the word
//! width). Slot sequence counters gate visibility of the data, so the
//! cursors themselves are read and advanced with relaxed ordering.

use std::sync::atomic::AtomicUsize;
use crossbeam_utils::CachePadded;

/// Memory ordering aliases used throughout the queue implementations
pub mod ordering {
    pub use std::sync::atomic::Ordering::Acquire as A;
    pub use std::sync::atomic::Ordering::Release as R;
    pub use std::sync::atomic::Ordering::Relaxed as X;
}

/// Enqueue and dequeue cursors of a ring
pub struct Cursors {
    /// Logical index of the next slot a producer will try to claim
    ///
    /// Placed on its own cache line to avoid false sharing with `dequeue`
    pub enqueue: CachePadded<AtomicUsize>,

    /// Logical index of the next slot a consumer will try to claim
    pub dequeue: CachePadded<AtomicUsize>,
}

impl Cursors {
    /// Both cursors start at zero
    #[inline]
    pub fn new() -> Self {
        Self {
            enqueue: CachePadded::new(AtomicUsize::new(0)),
            dequeue: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Number of records between the cursors at the time of the call
    ///
    /// Not linearizable with concurrent pushes/pops; diagnostics only.
    #[inline]
    pub fn was_size(&self) -> usize {
        // Load dequeue first so a racing consumer cannot make it overtake
        // the enqueue value we read afterwards.
        let dequeue = self.dequeue.load(ordering::X);
        let enqueue = self.enqueue.load(ordering::X);
        enqueue.wrapping_sub(dequeue)
    }

    /// Whether the cursors were equal at the time of the call
    #[inline]
    pub fn was_empty(&self) -> bool {
        self.enqueue.load(ordering::X) == self.dequeue.load(ordering::X)
    }
}

impl Default for Cursors {
    fn default() -> Self {
        Self::new()
    }
}
