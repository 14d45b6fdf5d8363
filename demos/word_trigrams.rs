//! Counts letter trigrams of a text file with one producer and one consumer.
//!
//! Usage: `cargo run --example word_trigrams -- <file> [ring|blocking] [capacity]`

use handoff_queue_rs::{handoff, init_tracing, Message, QueueConfig, Strategy};
use std::env;
use std::fs;
use std::process;
use std::thread;
use std::time::Instant;

const SPACE: u64 = ' ' as u64;

fn pack(a: u64, b: u64, c: u64) -> u64 {
    (a << 42) | (b << 21) | c
}

fn unpack(value: u64) -> String {
    [value >> 42, (value >> 21) & 0x1F_FFFF, value & 0x1F_FFFF]
        .into_iter()
        .filter_map(|cp| char::from_u32(cp as u32))
        .collect()
}

/// Trigrams of one word, padding short words and both edges with a space
fn trigrams(word: &[char]) -> Vec<u64> {
    let cp: Vec<u64> = word.iter().map(|&c| c as u64).collect();
    match cp.len() {
        0 => Vec::new(),
        1 => vec![pack(SPACE, cp[0], SPACE)],
        2 => vec![pack(cp[0], cp[1], SPACE)],
        n => {
            let mut out: Vec<u64> = cp.windows(3).map(|w| pack(w[0], w[1], w[2])).collect();
            out.push(pack(cp[n - 2], cp[n - 1], SPACE));
            out.push(pack(SPACE, cp[0], cp[1]));
            out
        }
    }
}

/// ASCII letters and the Russian alphabet (А-я, Ё, ё)
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '\u{0410}'..='\u{044F}' | '\u{0401}' | '\u{0451}')
}

fn words(text: &str) -> Vec<Vec<char>> {
    text.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .map(|w| w.chars().collect())
        .collect()
}

fn main() {
    init_tracing();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: word_trigrams <file> [ring|blocking] [capacity]");
        process::exit(2);
    };
    let strategy = match args.next().as_deref() {
        None | Some("ring") => Strategy::LockFree,
        Some("blocking") => Strategy::Blocking,
        Some(other) => {
            eprintln!("unknown strategy: {other}");
            process::exit(2);
        }
    };
    let capacity = args.next().and_then(|c| c.parse().ok()).unwrap_or(1024);

    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            process::exit(1);
        }
    };
    println!("File size: {} bytes", text.len());

    let config = QueueConfig::new().strategy(strategy).capacity(capacity);
    let queue = match config.build::<Message<u64>>() {
        Ok(queue) => queue,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let start = Instant::now();
    let words = words(&text);
    let counts = thread::scope(|s| {
        let queue = &queue;
        s.spawn(move || {
            let records = words.iter().flat_map(|w| trigrams(w)).map(Message::Data);
            handoff::produce(queue, records)
        });
        handoff::count(queue)
    });
    println!("Time: {} ms", start.elapsed().as_millis());

    let mut top: Vec<_> = counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (record, n) in top.into_iter().take(20) {
        if let Message::Data(value) = record {
            println!("{:?}: {}", unpack(value), n);
        }
    }
}
