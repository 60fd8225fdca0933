//! Background dispatch worker.
//!
//! Event sources enqueue events with a non-blocking `try_send`; the worker
//! thread dispatches them in arrival order and publishes a report per event.
//! A full queue drops the event and a full report channel drops the report;
//! neither ever blocks the producer or the worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{ExecutionError, PlaneError, PlaneResult};

use super::dispatcher::{DispatchReport, Dispatcher};
use super::Event;

const REPORT_PATH: &str = "dispatch_reports";

#[derive(Debug, Default)]
struct Counters {
    dropped_events: AtomicU64,
    dropped_reports: AtomicU64,
    rejected_events: AtomicU64,
}

/// Owns a dispatch thread fed by a bounded event queue.
#[derive(Debug)]
pub struct DispatchWorker {
    event_tx: Option<Sender<Event>>,
    report_rx: Receiver<DispatchReport>,
    counters: Arc<Counters>,
    join: Option<JoinHandle<()>>,
}

impl DispatchWorker {
    /// Spawns the worker thread.
    ///
    /// # Errors
    /// `Internal` if the thread cannot be spawned.
    pub fn start(dispatcher: Dispatcher, config: &DispatchConfig) -> PlaneResult<Self> {
        let (event_tx, event_rx) = bounded::<Event>(config.queue_capacity.max(1));
        let (report_tx, report_rx) = bounded::<DispatchReport>(config.report_capacity.max(1));
        let counters = Arc::new(Counters::default());

        let thread_counters = Arc::clone(&counters);
        let join = thread::Builder::new()
            .name("triggerplane-dispatch".to_string())
            .spawn(move || worker_loop(&dispatcher, &event_rx, &report_tx, &thread_counters))
            .map_err(|e| PlaneError::internal(format!("failed to spawn dispatch worker: {e}")))?;

        Ok(Self {
            event_tx: Some(event_tx),
            report_rx,
            counters,
            join: Some(join),
        })
    }

    /// Non-blocking enqueue. Returns `false` if the event was dropped.
    pub fn submit(&self, event: Event) -> bool {
        let Some(tx) = &self.event_tx else {
            self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) | Err(TrySendError::Disconnected(event)) => {
                warn!(event_id = %event.id, "dispatch queue unavailable, dropping event");
                self.counters.dropped_events.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Events dropped because the queue was full or closed.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.counters.dropped_events.load(Ordering::Relaxed)
    }

    /// Reports dropped because nobody was reading them.
    #[must_use]
    pub fn dropped_reports(&self) -> u64 {
        self.counters.dropped_reports.load(Ordering::Relaxed)
    }

    /// Events whose dispatch failed outright, e.g. an unknown source.
    #[must_use]
    pub fn rejected_events(&self) -> u64 {
        self.counters.rejected_events.load(Ordering::Relaxed)
    }

    /// Blocks until the next report.
    ///
    /// # Errors
    /// `Execution(Disconnected)` once the worker has stopped and every
    /// report has been read.
    pub fn recv_report(&self) -> PlaneResult<DispatchReport> {
        self.report_rx.recv().map_err(|_| disconnected())
    }

    /// Waits up to `timeout` for the next report.
    ///
    /// # Errors
    /// `Execution(Timeout)` if none arrived in time, `Execution(Disconnected)`
    /// if the worker has stopped.
    pub fn recv_report_timeout(&self, timeout: Duration) -> PlaneResult<DispatchReport> {
        self.report_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => PlaneError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Closes the queue, lets the worker drain it, and joins the thread.
    ///
    /// Reports produced while draining remain readable afterwards; later
    /// submissions are dropped. Calling it again is a no-op.
    ///
    /// # Errors
    /// `Internal` if the worker thread panicked.
    pub fn shutdown(&mut self) -> PlaneResult<()> {
        drop(self.event_tx.take());
        match self.join.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlaneError::internal("dispatch worker panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for DispatchWorker {
    fn drop(&mut self) {
        // Closing the queue lets the worker exit on its own; joining here
        // could stall on a long-running executor.
        drop(self.event_tx.take());
        drop(self.join.take());
    }
}

fn disconnected() -> PlaneError {
    PlaneError::Execution(ExecutionError::Disconnected {
        path: REPORT_PATH.to_string(),
    })
}

fn worker_loop(
    dispatcher: &Dispatcher,
    event_rx: &Receiver<Event>,
    report_tx: &Sender<DispatchReport>,
    counters: &Counters,
) {
    for event in event_rx {
        match dispatcher.dispatch(&event) {
            Ok(report) => match report_tx.try_send(report) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                    counters.dropped_reports.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(e) => {
                warn!(event_id = %event.id, event_source_id = %event.source_id, error = %e, "event rejected");
                counters.rejected_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    debug!("dispatch queue closed, worker exiting");
}
