//! Unbounded queue guarded by a mutex and condition variable
//!
//! Producers never wait. Consumers sleep until a record arrives; the
//! terminator is consumed by the queue itself and reported as end-of-stream.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::Full;
use crate::trace::debug;
use crate::{HandoffQueue, Record, Recv};

struct State<T> {
    records: VecDeque<T>,
    /// Latched once a consumer has taken the terminator
    ended: bool,
}

/// A blocking queue with the same push/pop contract as the ring buffer
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty queue with room for `capacity` records before it
    /// reallocates. The queue still grows without bound.
    pub fn with_capacity(capacity: usize) -> Self {
        debug!(capacity, "blocking queue created");
        Self {
            state: Mutex::new(State {
                records: VecDeque::with_capacity(capacity),
                ended: false,
            }),
            available: Condvar::new(),
        }
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record and wakes one waiting consumer
    pub fn enqueue(&self, record: T) {
        let mut state = self.lock();
        state.records.push_back(record);
        drop(state);
        self.available.notify_one();
    }

    /// Number of queued records, terminator included
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether no records are queued at the time of the call
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Whether a consumer has already taken the terminator
    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }
}

impl<T: Record> BlockingQueue<T> {
    /// Waits for the next record
    ///
    /// Returns [`Recv::End`] when the front record is the terminator, or when
    /// the queue is drained after another consumer took the terminator.
    /// Never returns [`Recv::Empty`].
    pub fn wait_and_pop(&self) -> Recv<T> {
        let guard = self.lock();
        let mut state = self
            .available
            .wait_while(guard, |s| s.records.is_empty() && !s.ended)
            .unwrap_or_else(PoisonError::into_inner);

        match state.records.pop_front() {
            Some(record) if record.is_terminator() => {
                state.ended = true;
                drop(state);
                debug!("blocking queue observed terminator");
                // Other consumers may be asleep on an empty queue.
                self.available.notify_all();
                Recv::End
            }
            Some(record) => Recv::Data(record),
            None => Recv::End,
        }
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> HandoffQueue<T> for BlockingQueue<T> {
    fn try_push(&self, record: T) -> Result<(), Full<T>> {
        self.enqueue(record);
        Ok(())
    }

    fn recv(&self) -> Recv<T> {
        self.wait_and_pop()
    }

    fn is_empty(&self) -> bool {
        BlockingQueue::is_empty(self)
    }
}
