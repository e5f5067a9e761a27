//! Dispatcher (component E): fans `(poly, dir)` tasks across worker threads
//! and serialises emitted results through a single channel.
//!
//! The teacher repo's own scheduler is explicitly single-threaded (see its
//! module doc comment disclaiming multi-threading as future work), so this
//! component is grounded instead on the sibling `arkworks-rs-snark` repo's
//! `algebra-core::curves::batch_verify::run_rounds`, which spawns one
//! `std::thread` per unit of independent work and joins them to propagate a
//! `Result`. We generalise that into a scoped-thread pool over an `mpsc`
//! channel: `std::thread::scope` lets every worker borrow the Observation
//! Cache and the search-configuration sets directly (no `Arc` needed, unlike
//! `run_rounds`) because the scope statically guarantees every spawned
//! thread joins before the borrow ends.

#![forbid(unsafe_code)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Mutex;

use crate::cache::Observation;
use crate::crc::Direction;
use crate::error::SolverError;
use crate::search::{search_one, ResultRecord, SearchSet};

enum Message {
    Record(ResultRecord),
    Stop,
}

/// Enumerate `polys x dirs` and run [`search_one`] for each pair across a
/// scoped worker pool, returning every emitted result.
///
/// Every `(poly, dir)` pair is attempted exactly once. A panic inside a
/// worker (an internal bug, not a search miss) is caught at the join point
/// and surfaced as [`SolverError::WorkerFault`], aborting the run; results
/// already drained from the sink up to that point are discarded along with
/// the rest, since `solve()` has no partial-success contract.
pub fn dispatch(
    observations: &[Observation],
    order: u32,
    polys: &SearchSet,
    dirs: &[Direction],
    inits: &SearchSet,
    posts: &SearchSet,
    same_length: bool,
) -> Result<Vec<ResultRecord>, SolverError> {
    let pairs: Vec<(u64, Direction)> =
        polys.iter().flat_map(|p| dirs.iter().map(move |d| (p, *d))).collect();
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).max(1).min(pairs.len());
    let chunk_size = pairs.len().div_ceil(worker_count);
    let chunks: Vec<&[(u64, Direction)]> = pairs.chunks(chunk_size).collect();

    let (tx, rx) = mpsc::channel::<Message>();
    let worker_fault: Mutex<Option<SolverError>> = Mutex::new(None);

    let results = std::thread::scope(|scope| {
        let consumer = scope.spawn(move || {
            let mut out = Vec::new();
            loop {
                match rx.recv() {
                    Ok(Message::Record(r)) => out.push(r),
                    Ok(Message::Stop) | Err(_) => break,
                }
            }
            out
        });

        let mut handles = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let tx = tx.clone();
            let worker_fault = &worker_fault;
            handles.push(scope.spawn(move || {
                for &(poly, dir) in *chunk {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        search_one(observations, poly, dir, order, inits, posts, same_length)
                    }));
                    match outcome {
                        Ok(found) => {
                            for record in found {
                                let _ = tx.send(Message::Record(record));
                            }
                        }
                        Err(payload) => {
                            let message = panic_message(&payload);
                            let mut slot = worker_fault.lock().expect("worker_fault mutex poisoned");
                            if slot.is_none() {
                                *slot = Some(SolverError::WorkerFault { poly, dir, message });
                            }
                        }
                    }
                }
            }));
        }

        for handle in handles {
            if handle.join().is_err() {
                let mut slot = worker_fault.lock().expect("worker_fault mutex poisoned");
                if slot.is_none() {
                    *slot = Some(SolverError::WorkerFault {
                        poly: 0,
                        dir: Direction::Forward,
                        message: "worker thread itself panicked outside search_one".to_string(),
                    });
                }
            }
        }

        // All workers have joined, so every Record they sent is already
        // queued ahead of this Stop — the consumer drains the sink and
        // terminates on the sentinel rather than on channel closure.
        let _ = tx.send(Message::Stop);

        consumer.join().expect("consumer thread does not panic")
    });

    if let Some(err) = worker_fault.into_inner().expect("worker_fault mutex poisoned") {
        return Err(err);
    }
    Ok(results)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
