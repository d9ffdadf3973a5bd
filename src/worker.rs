// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Background drain worker.
//!
//! The sole consumer of the write-back queue. Sleeps until signalled,
//! drains everything queued, and retries on a fixed cadence while the
//! last drain failed. After read activity it waits for reads to go quiet
//! and then rewinds the read cursor. Exits on terminate or once the log
//! has been uninitialized.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::LogError;
use crate::log::EventLog;
use crate::memory::FlashMemory;

/// Notifications delivered to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// A record was queued.
    RecordQueued,
    /// A read is in progress.
    ReadActivity,
    /// Drain what is left and exit.
    Terminate,
}

const SIGNAL_DEPTH: usize = 16;

pub struct DrainWorker {
    signals: Sender<WorkerSignal>,
    handle: Option<JoinHandle<()>>,
}

impl DrainWorker {
    /// Starts the worker thread and attaches it to `log`.
    pub fn spawn<M>(log: Arc<EventLog<M>>, config: WorkerConfig) -> io::Result<Self>
    where
        M: FlashMemory + 'static,
    {
        let (tx, rx) = bounded(SIGNAL_DEPTH);
        log.attach_worker(tx.clone());

        let worker_log = Arc::clone(&log);
        let spawned = thread::Builder::new()
            .name("flashlog-drain".into())
            .spawn(move || run(worker_log, rx, config));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                log.detach_worker();
                return Err(e);
            }
        };

        Ok(Self {
            signals: tx,
            handle: Some(handle),
        })
    }

    /// Asks the worker to commit everything still queued and exit. With
    /// `blocking` set, returns only after the thread has finished.
    pub fn terminate(mut self, blocking: bool) {
        self.stop(blocking);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    fn stop(&mut self, blocking: bool) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // A closed channel means the worker is already gone.
        let _ = self.signals.send(WorkerSignal::Terminate);
        if blocking && handle.join().is_err() {
            warn!("Drain worker panicked");
        }
    }
}

impl Drop for DrainWorker {
    fn drop(&mut self) {
        self.stop(true);
    }
}

fn run<M: FlashMemory>(log: Arc<EventLog<M>>, signals: Receiver<WorkerSignal>, config: WorkerConfig) {
    info!("Drain worker started");
    let mut last_read: Option<Instant> = None;

    loop {
        let drained_ok = match log.drain(config.batch_limit) {
            Ok(_) => true,
            Err(LogError::NotInitialized) => {
                debug!("Log uninitialized, nothing left to drain");
                break;
            }
            Err(e) => {
                warn!(error = %e, pending = log.pending(), "Drain failed, will retry");
                false
            }
        };

        if let Some(at) = last_read {
            if at.elapsed() >= config.read_idle() {
                rewind_cursor(&log);
                last_read = None;
            }
        }

        let signal = match next_wait(drained_ok, log.is_commit_pending(), last_read, &config) {
            None => match signals.recv() {
                Ok(signal) => signal,
                Err(_) => break,
            },
            Some(wait) => match signals.recv_timeout(wait) {
                Ok(signal) => signal,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
        };

        match signal {
            WorkerSignal::RecordQueued => {}
            WorkerSignal::ReadActivity => last_read = Some(Instant::now()),
            WorkerSignal::Terminate => break,
        }
    }

    if log.is_initialized() {
        match log.drain(u32::MAX) {
            Ok(committed) => debug!(committed, "Final drain"),
            Err(e) => warn!(error = %e, pending = log.pending(), "Final drain failed"),
        }
        if last_read.is_some() {
            rewind_cursor(&log);
        }
    }
    log.detach_worker();
    info!("Drain worker stopped");
}

/// How long to sleep before the next pass. `None` blocks until signalled.
fn next_wait(
    drained_ok: bool,
    pending: bool,
    last_read: Option<Instant>,
    config: &WorkerConfig,
) -> Option<Duration> {
    let mut wait: Option<Duration> = None;
    let mut shorten = |candidate: Duration| {
        wait = Some(wait.map_or(candidate, |current| current.min(candidate)));
    };

    if !drained_ok {
        shorten(config.retry_interval());
    } else if pending {
        // Batch limit reached with more queued.
        shorten(Duration::ZERO);
    }
    if let Some(at) = last_read {
        shorten(config.read_idle().saturating_sub(at.elapsed()));
    }
    wait
}

fn rewind_cursor<M: FlashMemory>(log: &EventLog<M>) {
    if log.reset_cursor().is_ok() {
        debug!("Read cursor rewound after reads went idle");
    }
}
