//! Per-generation worker pool.
//!
//! Every call builds a fresh rayon pool, fans one task out per output slot and
//! joins on a channel with a bounded wait. The pool is dropped when the call
//! returns; nothing survives between generations.

use dgc_core::{DgcError, Result};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Worker count when none is configured: the available hardware parallelism.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs `task(i)` for every `i < tasks` on a short-lived pool and returns the
/// results in slot order.
///
/// The first failing task aborts the whole call: tasks not yet started are
/// skipped and the error is returned. A task that panics is reported as
/// [`DgcError::WorkerFailed`]. If the slots are not all filled within
/// `timeout` the call fails with [`DgcError::Timeout`]; a channel that closes
/// early fails with [`DgcError::Interrupted`]. A partially filled result is
/// never returned.
///
/// The timeout bounds the wait for results, not the call itself: after an
/// abort, tasks not yet started are skipped but tasks already running are
/// joined before `run_slots` returns. A task that never finishes therefore
/// still blocks the caller once the timeout has been logged.
pub fn run_slots<F>(tasks: usize, threads: usize, timeout: Duration, task: F) -> Result<Vec<f64>>
where
    F: Fn(usize) -> Result<f64> + Sync,
{
    if tasks == 0 {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1).min(tasks))
        .thread_name(|i| format!("dgc-eval-{}", i))
        .build()
        .map_err(|e| DgcError::internal(format!("failed to build evaluation pool: {}", e)))?;

    let mut slots: Vec<Option<f64>> = vec![None; tasks];
    let aborted = AtomicBool::new(false);
    let deadline = Instant::now().checked_add(timeout);

    pool.in_place_scope(|scope| {
        let (tx, rx) = mpsc::channel::<(usize, Result<f64>)>();

        for index in 0..tasks {
            let tx = tx.clone();
            let task = &task;
            let aborted = &aborted;
            scope.spawn(move |_| {
                if aborted.load(Ordering::Acquire) {
                    return;
                }
                let outcome = catch_unwind(AssertUnwindSafe(|| task(index)))
                    .unwrap_or_else(|payload| Err(DgcError::worker(index, panic_message(payload))));
                // Receiver is gone only after an abort.
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let mut filled = 0;
        while filled < tasks {
            let message = match deadline {
                Some(deadline) => {
                    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match message {
                Ok((index, Ok(value))) => {
                    slots[index] = Some(value);
                    filled += 1;
                }
                Ok((index, Err(err))) => {
                    aborted.store(true, Ordering::Release);
                    log::error!("Evaluation task {} failed, aborting generation: {}", index, err);
                    return Err(err);
                }
                Err(RecvTimeoutError::Timeout) => {
                    aborted.store(true, Ordering::Release);
                    log::error!(
                        "Generation timed out after {:?} with {}/{} slots filled",
                        timeout,
                        filled,
                        tasks
                    );
                    return Err(DgcError::timeout(format!(
                        "{}/{} candidates scored within {:?}",
                        filled, tasks, timeout
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    aborted.store(true, Ordering::Release);
                    log::error!(
                        "Evaluation channel closed with {}/{} slots filled",
                        filled,
                        tasks
                    );
                    return Err(DgcError::interrupted(format!(
                        "wait ended with {}/{} candidates scored",
                        filled, tasks
                    )));
                }
            }
        }
        Ok(())
    })?;

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| DgcError::interrupted(format!("slot {} was never filled", index)))
        })
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
