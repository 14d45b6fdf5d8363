//! Bounded lock-free ring buffer
//!
//! A fixed array of slots, each carrying its own sequence counter. Slot `i`
//! starts with sequence `i`. For a cursor value `pos` landing on a slot:
//!
//! - `seq == pos`: the slot is free for the producer holding `pos`
//! - `seq == pos + 1`: the slot is full for the consumer holding `pos`
//! - `seq == pos + capacity`: the consumer released it for the next lap
//!
//! Producers and consumers claim a slot by advancing their cursor with a
//! compare-and-swap; the acquire load and release store of the sequence
//! counter are the only synchronization edge for the record itself.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use crate::common::{ordering, Cursors};
use crate::error::{CapacityViolation, Full, QueueError, Result};
use crate::trace::{debug, warn};
use crate::{HandoffQueue, Record, Recv};

/// Largest number of slots a ring may be built with
pub const MAX_CAPACITY: usize = 1 << 30;

/// Smallest number of slots a ring may be built with
pub const MIN_CAPACITY: usize = 2;

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new(sequence: usize) -> Self {
        Self {
            sequence: AtomicUsize::new(sequence),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// A lock-free bounded multi-producer multi-consumer queue
///
/// Neither `try_push` nor `try_pop` blocks or allocates: both return
/// immediately when the ring is full or empty, and only spin when they lose
/// a cursor race to another thread (which therefore made progress).
pub struct RingBuffer<T> {
    cursors: Cursors,
    slots: Box<[Slot<T>]>,
    mask: usize,
    /// Set once a consumer has dequeued the terminator through `recv`
    ended: AtomicBool,
}

// Safety: a slot's record is only touched by the thread that won the cursor
// CAS for it, and ownership is handed over through the sequence counter.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

/// Checks that `capacity` is a power of two within `[MIN_CAPACITY, MAX_CAPACITY]`
pub fn validate_capacity(capacity: usize) -> Result<()> {
    let reason = if capacity < MIN_CAPACITY {
        CapacityViolation::TooSmall
    } else if capacity > MAX_CAPACITY {
        CapacityViolation::TooLarge
    } else if !capacity.is_power_of_two() {
        CapacityViolation::NotPowerOfTwo
    } else {
        return Ok(());
    };

    Err(QueueError::InvalidCapacity {
        requested: capacity,
        reason,
    })
}

impl<T> RingBuffer<T> {
    /// Creates an empty ring with exactly `capacity` slots
    ///
    /// Fails with [`QueueError::InvalidCapacity`] unless `capacity` is a power
    /// of two between 2 and 2^30.
    pub fn new(capacity: usize) -> Result<Self> {
        if let Err(err) = validate_capacity(capacity) {
            warn!(capacity, error = %err, "rejected ring capacity");
            return Err(err);
        }

        let slots: Box<[Slot<T>]> = (0..capacity).map(Slot::new).collect();
        debug!(capacity, "ring buffer created");

        Ok(Self {
            cursors: Cursors::new(),
            slots,
            mask: capacity - 1,
            ended: AtomicBool::new(false),
        })
    }

    #[inline(always)]
    fn slot(&self, pos: usize) -> &Slot<T> {
        &self.slots[pos & self.mask]
    }

    /// Attempts to enqueue `value`
    ///
    /// Returns the value inside [`Full`] when the slot at the enqueue cursor
    /// has not been released by a consumer yet.
    pub fn try_push(&self, value: T) -> std::result::Result<(), Full<T>> {
        let mut pos = self.cursors.enqueue.load(ordering::X);
        let slot = loop {
            let slot = self.slot(pos);
            let seq = slot.sequence.load(ordering::A);
            let diff = seq.wrapping_sub(pos) as isize;

            if diff < 0 {
                return Err(Full(value));
            }

            if diff == 0 {
                match self.cursors.enqueue.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    ordering::X,
                    ordering::X,
                ) {
                    Ok(_) => break slot,
                    Err(current) => pos = current,
                }
            } else {
                // Another producer already filled this slot; catch up.
                pos = self.cursors.enqueue.load(ordering::X);
            }
        };

        // Safety: winning the CAS for `pos` gives this thread exclusive access
        // to the slot until the sequence store below publishes it.
        unsafe { (*slot.value.get()).write(value) };
        slot.sequence.store(pos.wrapping_add(1), ordering::R);
        Ok(())
    }

    /// Attempts to dequeue the oldest record of the current slot cycle
    ///
    /// Returns `None` when the slot at the dequeue cursor has not been
    /// published yet. The terminator is returned like any other record.
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.cursors.dequeue.load(ordering::X);
        let slot = loop {
            let slot = self.slot(pos);
            let seq = slot.sequence.load(ordering::A);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;

            if diff < 0 {
                return None;
            }

            if diff == 0 {
                match self.cursors.dequeue.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    ordering::X,
                    ordering::X,
                ) {
                    Ok(_) => break slot,
                    Err(current) => pos = current,
                }
            } else {
                pos = self.cursors.dequeue.load(ordering::X);
            }
        };

        // Safety: the acquire load above observed `pos + 1`, so the producer's
        // write is visible and no other consumer can claim `pos`.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.sequence
            .store(pos.wrapping_add(self.mask).wrapping_add(1), ordering::R);
        Some(value)
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Best-effort count of queued records; diagnostics only
    #[inline]
    pub fn was_size(&self) -> usize {
        self.cursors.was_size().min(self.capacity())
    }

    /// Best-effort emptiness snapshot; diagnostics only
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursors.was_empty()
    }

    /// Whether a consumer has already dequeued the terminator
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.ended.load(ordering::A)
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        // Exclusive access: every claimed slot has been published, so the
        // records between the cursors are exactly the initialized ones.
        while self.try_pop().is_some() {}
    }
}

impl<T: Record> HandoffQueue<T> for RingBuffer<T> {
    fn try_push(&self, record: T) -> std::result::Result<(), Full<T>> {
        RingBuffer::try_push(self, record)
    }

    /// Once the terminator has been taken, an empty ring reports
    /// [`Recv::End`] to every consumer. Records pushed after the terminator
    /// are still delivered.
    fn recv(&self) -> Recv<T> {
        match self.try_pop() {
            None if self.is_ended() => Recv::End,
            None => Recv::Empty,
            Some(record) if record.is_terminator() => {
                self.ended.store(true, ordering::R);
                debug!("ring observed terminator");
                Recv::End
            }
            Some(record) => Recv::Data(record),
        }
    }

    fn is_empty(&self) -> bool {
        RingBuffer::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_capacity_validation() {
        for shift in 1..=16 {
            let ring = RingBuffer::<u32>::new(1 << shift).unwrap();
            assert_eq!(ring.capacity(), 1 << shift);
        }
        for shift in 17..=30 {
            assert!(validate_capacity(1 << shift).is_ok());
        }

        let rejected = [
            (0, CapacityViolation::TooSmall),
            (1, CapacityViolation::TooSmall),
            (3, CapacityViolation::NotPowerOfTwo),
            (6, CapacityViolation::NotPowerOfTwo),
            (1000, CapacityViolation::NotPowerOfTwo),
            ((1 << 30) + 1, CapacityViolation::TooLarge),
            (1 << 31, CapacityViolation::TooLarge),
        ];
        for (requested, reason) in rejected {
            assert_eq!(
                RingBuffer::<u32>::new(requested).err(),
                Some(QueueError::InvalidCapacity { requested, reason })
            );
        }
    }

    #[test]
    fn test_fifo_round_trip() {
        let ring = RingBuffer::<u64>::new(16).unwrap();
        for i in 1..=16 {
            assert!(ring.try_push(i * 10).is_ok());
        }
        for i in 1..=16 {
            assert_eq!(ring.try_pop(), Some(i * 10));
        }
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn test_full_then_one_pop() {
        let ring = RingBuffer::<u32>::new(8).unwrap();
        for i in 0..8 {
            ring.try_push(i).unwrap();
        }
        assert_eq!(ring.was_size(), 8);
        assert_eq!(ring.try_push(99), Err(Full(99)));

        assert_eq!(ring.try_pop(), Some(0));
        assert!(ring.try_push(99).is_ok());
        assert_eq!(ring.try_push(100), Err(Full(100)));
    }

    #[test]
    fn test_empty_ring() {
        let ring = RingBuffer::<u32>::new(2).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.try_pop(), None);

        ring.try_push(5).unwrap();
        assert!(!ring.is_empty());
        assert_eq!(ring.try_pop(), Some(5));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_capacity_four_scenario() {
        let ring = RingBuffer::<char>::new(4).unwrap();
        for c in ['A', 'B', 'C', 'D'] {
            assert!(ring.try_push(c).is_ok());
        }
        assert!(ring.try_push('E').is_err());
        assert_eq!(ring.try_pop(), Some('A'));
        assert!(ring.try_push('E').is_ok());
        for c in ['B', 'C', 'D', 'E'] {
            assert_eq!(ring.try_pop(), Some(c));
        }
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn test_wrap_around_many_laps() {
        let ring = RingBuffer::<usize>::new(4).unwrap();
        let mut next_out = 0;
        for i in 0..1000 {
            ring.try_push(i).unwrap();
            if i % 3 == 2 {
                // Keep the ring partially filled so laps overlap.
                while let Some(v) = ring.try_pop() {
                    assert_eq!(v, next_out);
                    next_out += 1;
                }
            }
        }
        while let Some(v) = ring.try_pop() {
            assert_eq!(v, next_out);
            next_out += 1;
        }
        assert_eq!(next_out, 1000);
    }

    #[test]
    fn test_drop_releases_remaining_records() {
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let ring = RingBuffer::new(8).unwrap();
            for _ in 0..5 {
                assert!(ring.try_push(Counted(drops.clone())).is_ok());
            }
            drop(ring.try_pop());
            assert_eq!(drops.load(Ordering::Relaxed), 1);
        }
        assert_eq!(drops.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_handoff_terminator_is_not_data() {
        let ring = RingBuffer::<u32>::new(4).unwrap();
        let mut out = 42;
        assert!(HandoffQueue::push(&ring, 7));
        assert!(HandoffQueue::push(&ring, 0));
        assert!(ring.pop(&mut out));
        assert_eq!(out, 7);
        assert!(!ring.pop(&mut out));
        assert_eq!(out, 7);
        assert!(!ring.pop(&mut out));
        assert!(HandoffQueue::is_empty(&ring));
    }

    #[test]
    fn test_one_terminator_stops_every_consumer() {
        let ring = Arc::new(RingBuffer::<u32>::new(8).unwrap());
        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let ring = ring.clone();
                thread::spawn(move || crate::handoff::consume(&*ring, 0u32, |n, _| n + 1))
            })
            .collect();

        crate::handoff::produce(&*ring, [1, 2, 3]);

        let total: u32 = consumers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 3);
        assert!(ring.is_ended());

        let mut out = 0;
        assert!(!ring.pop(&mut out));
        assert_eq!(ring.recv(), Recv::End);

        // Late data is still handed out before the ended state shows again.
        assert!(HandoffQueue::push(&*ring, 9));
        assert_eq!(ring.recv(), Recv::Data(9));
        assert_eq!(ring.recv(), Recv::End);
    }

    #[test]
    fn test_cursors_wrap_at_word_width() {
        let ring = RingBuffer::<usize>::new(4).unwrap();
        let start = usize::MAX - 5;
        ring.cursors.enqueue.store(start, Ordering::Relaxed);
        ring.cursors.dequeue.store(start, Ordering::Relaxed);
        for k in 0..ring.capacity() {
            let pos = start.wrapping_add(k);
            ring.slot(pos).sequence.store(pos, Ordering::Relaxed);
        }
        assert!(ring.is_empty());

        let mut next_in = 0;
        let mut next_out = 0;
        while next_out < 102 {
            while next_in < 102 && ring.try_push(next_in).is_ok() {
                next_in += 1;
            }
            assert_eq!(ring.try_pop(), Some(next_out));
            next_out += 1;
        }
        assert_eq!(ring.try_pop(), None);
        assert!(ring.is_empty());
        assert_eq!(ring.cursors.enqueue.load(Ordering::Relaxed), start.wrapping_add(102));
        assert!(ring.cursors.enqueue.load(Ordering::Relaxed) < start);
    }

    #[test]
    fn test_ring_threaded() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 10_000;

        let ring = Arc::new(RingBuffer::<usize>::new(64).unwrap());
        let popped = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for p in 0..PRODUCERS {
            let ring = ring.clone();
            handles.push(thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut value = p * PER_PRODUCER + i;
                    while let Err(Full(v)) = ring.try_push(value) {
                        value = v;
                        thread::yield_now();
                    }
                }
                0
            }));
        }
        for _ in 0..CONSUMERS {
            let ring = ring.clone();
            let popped = popped.clone();
            handles.push(thread::spawn(move || {
                let mut sum = 0;
                while popped.load(Ordering::Relaxed) < PRODUCERS * PER_PRODUCER {
                    if let Some(v) = ring.try_pop() {
                        sum += v;
                        popped.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
                sum
            }));
        }

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let n = PRODUCERS * PER_PRODUCER;
        assert_eq!(total, n * (n - 1) / 2);
        assert!(ring.is_empty());
    }
}
