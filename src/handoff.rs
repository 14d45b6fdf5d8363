//! Producer and consumer loops for the termination protocol
//!
//! A producer pushes every record and then exactly one terminator. A
//! consumer pops until it dequeues the terminator, folding every data record
//! it sees. There is no separate close operation.

use std::collections::HashMap;
use std::hash::Hash;

use crossbeam_utils::Backoff;

use crate::error::Full;
use crate::trace::debug;
use crate::{HandoffQueue, Record, Recv};

/// Pushes `record`, backing off while the queue reports full
pub fn push_blocking<T, Q>(queue: &Q, mut record: T)
where
    T: Record,
    Q: HandoffQueue<T> + ?Sized,
{
    let backoff = Backoff::new();
    while let Err(Full(rejected)) = queue.try_push(record) {
        record = rejected;
        backoff.snooze();
    }
}

/// Pushes every record followed by one terminator
///
/// Records equal to the terminator are skipped so they cannot end the stream
/// early. Returns the number of data records pushed.
pub fn produce<T, Q, I>(queue: &Q, records: I) -> usize
where
    T: Record,
    Q: HandoffQueue<T> + ?Sized,
    I: IntoIterator<Item = T>,
{
    let mut pushed = 0;
    for record in records {
        if record.is_terminator() {
            continue;
        }
        push_blocking(queue, record);
        pushed += 1;
    }

    push_blocking(queue, T::terminator());
    debug!(pushed, "producer finished");
    pushed
}

/// Dequeues until the terminator, folding each data record into `acc`
///
/// An empty lock-free queue is polled with backoff; only the terminator
/// ends the loop.
pub fn consume<T, Q, A, F>(queue: &Q, init: A, mut fold: F) -> A
where
    T: Record,
    Q: HandoffQueue<T> + ?Sized,
    F: FnMut(A, T) -> A,
{
    let backoff = Backoff::new();
    let mut acc = init;
    loop {
        match queue.recv() {
            Recv::Data(record) => {
                acc = fold(acc, record);
                backoff.reset();
            }
            Recv::Empty => backoff.snooze(),
            Recv::End => return acc,
        }
    }
}

/// Counts how many times each data record arrives before the terminator
pub fn count<T, Q>(queue: &Q) -> HashMap<T, usize>
where
    T: Record + Eq + Hash,
    Q: HandoffQueue<T> + ?Sized,
{
    consume(queue, HashMap::new(), |mut counts, record| {
        *counts.entry(record).or_insert(0) += 1;
        counts
    })
}
