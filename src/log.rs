// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Event Log - durability front-ends over the engine.
//!
//! - `enqueue` (write-back): copies the record into the bounded queue and
//!   returns. Never touches the medium, never takes the log lock.
//! - `commit_sync` (write-through): appends under the log lock and returns
//!   once the record and its position are persisted.
//! - `drain`: commits queued records one at a time, popping each only
//!   after its append succeeded.
//! - `uninitialize`: flushes the queue before detaching, so queued records
//!   are only lost when the medium refuses them.
//!
//! Every engine access goes through one lock acquired with the configured
//! timeout and released fairly, so synchronous producers and the drain
//! worker take turns in arrival order.

use crossbeam::channel::Sender;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::LogConfig;
use crate::cursor::ReadCursor;
use crate::engine::LogEngine;
use crate::error::{LogError, Result};
use crate::geometry::{LogSnapshot, LogState};
use crate::memory::FlashMemory;
use crate::queue::RecordQueue;
use crate::store::StateSink;
use crate::worker::WorkerSignal;

/// Result of [`EventLog::uninitialize`].
#[derive(Debug)]
pub struct Uninitialized<M> {
    /// The detached memory interface; `None` if the log was not initialized.
    pub memory: Option<M>,
    /// Queued records committed during the final flush.
    pub flushed: u32,
    /// Queued records discarded because the final flush failed.
    pub dropped: usize,
}

pub struct EventLog<M: FlashMemory> {
    engine: Mutex<Option<LogEngine<M>>>,
    queue: RecordQueue,
    /// Record size while initialized, 0 otherwise. Lets `enqueue` validate
    /// without the log lock.
    record_size: AtomicU32,
    cursor: Mutex<ReadCursor>,
    signals: Mutex<Option<Sender<WorkerSignal>>>,
    lock_wait: Duration,
    enqueue_wait: Duration,
}

impl<M: FlashMemory> EventLog<M> {
    /// Initializes the engine against `memory` and reports every later
    /// position change to `sink`.
    ///
    /// Fails without leaving anything initialized when the configuration,
    /// the memory interface or the resulting geometry is unusable.
    pub fn initialize(config: &LogConfig, memory: M, sink: impl StateSink + 'static) -> Result<Self> {
        let engine = LogEngine::initialize(config, memory, Box::new(sink))?;
        let record_size = engine.geometry().record_size;

        Ok(Self {
            engine: Mutex::new(Some(engine)),
            queue: RecordQueue::new(config.queue_capacity),
            record_size: AtomicU32::new(record_size),
            cursor: Mutex::new(ReadCursor::default()),
            signals: Mutex::new(None),
            lock_wait: config.lock_wait(),
            enqueue_wait: config.enqueue_wait(),
        })
    }

    /// Commits whatever is still queued, detaches the memory interface and
    /// zeroes the log. Later calls fail with `NotInitialized` and an
    /// attached drain worker is told to exit.
    ///
    /// Records that could not be committed are reported in
    /// [`Uninitialized::dropped`].
    pub fn uninitialize(&self) -> Uninitialized<M> {
        // Closes enqueue before the final flush.
        self.record_size.store(0, Ordering::Release);

        let (engine, flushed) = {
            let mut guard = self.engine.lock();
            let flushed = match guard.as_mut() {
                Some(engine) => self.flush_queue(engine),
                None => 0,
            };
            (guard.take(), flushed)
        };
        self.cursor.lock().reset();
        self.signal(WorkerSignal::Terminate);

        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!(dropped, "Uninitialized with uncommitted records");
        }

        let memory = engine.map(LogEngine::into_memory);
        if memory.is_some() {
            info!(flushed, "Event log uninitialized");
        }
        Uninitialized {
            memory,
            flushed,
            dropped,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.record_size.load(Ordering::Acquire) != 0
    }

    /// Write-back: queues a copy of `record` for the drain worker.
    pub fn enqueue(&self, record: &[u8]) -> Result<()> {
        self.check_record(record)?;
        self.queue.push(record, self.enqueue_wait)?;
        self.signal(WorkerSignal::RecordQueued);
        Ok(())
    }

    /// Write-through: appends `record` and returns once its position has
    /// been reported to the state sink.
    pub fn commit_sync(&self, record: &[u8]) -> Result<LogState> {
        self.check_record(record)?;
        self.with_engine(|engine| engine.append(record))
    }

    /// Commits up to `max_items` queued records in FIFO order.
    ///
    /// Stops early on an empty queue or on the first failed append, which
    /// is returned with the failing record still at the head of the queue.
    /// Returns how many records were committed.
    pub fn drain(&self, max_items: u32) -> Result<u32> {
        if !self.is_initialized() {
            return Err(LogError::NotInitialized);
        }

        let mut committed = 0;
        while committed < max_items {
            match self.with_engine(|engine| self.commit_head(engine)) {
                Ok(true) => committed += 1,
                Ok(false) => break,
                Err(e) => {
                    if committed > 0 {
                        debug!(committed, "Drain stopped early");
                    }
                    return Err(e);
                }
            }
        }

        if committed > 0 {
            debug!(committed, pending = self.queue.len(), "Drained queued records");
        }
        Ok(committed)
    }

    /// Reads record `index` (0 = newest) into the front of `buf`.
    pub fn read(&self, index: u32, buf: &mut [u8]) -> Result<()> {
        let result = self.with_engine(|engine| engine.read(index, buf));
        self.signal(WorkerSignal::ReadActivity);
        result
    }

    /// Reads record `index` into a fresh buffer.
    pub fn read_record(&self, index: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.record_size.load(Ordering::Acquire) as usize];
        self.read(index, &mut buf)?;
        Ok(buf)
    }

    /// Reads the record under the read cursor, then advances the cursor,
    /// wrapping to the newest record after the oldest.
    pub fn read_next(&self, buf: &mut [u8]) -> Result<()> {
        if !self.is_initialized() {
            return Err(LogError::NotInitialized);
        }

        let index = self.cursor.lock().position();
        let result = self.read(index, buf);

        let count = self.snapshot()?.state.count;
        self.cursor.lock().advance(count);
        result
    }

    pub fn reset_cursor(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(LogError::NotInitialized);
        }
        self.cursor.lock().reset();
        Ok(())
    }

    pub fn cursor_position(&self) -> u32 {
        self.cursor.lock().position()
    }

    /// Erases the whole region and starts over empty. Records still queued
    /// are kept and land in the cleared log.
    pub fn clear(&self) -> Result<()> {
        self.with_engine(|engine| engine.clear())
    }

    /// Copy of geometry and state taken under the lock. All zero when the
    /// log is not initialized.
    pub fn snapshot(&self) -> Result<LogSnapshot> {
        let guard = self.lock_engine()?;
        Ok(guard.as_ref().map(LogEngine::snapshot).unwrap_or_default())
    }

    /// True while the write-back queue holds records.
    pub fn is_commit_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub(crate) fn attach_worker(&self, signals: Sender<WorkerSignal>) {
        *self.signals.lock() = Some(signals);
    }

    pub(crate) fn detach_worker(&self) {
        self.signals.lock().take();
    }

    /// Appends the head of the queue and pops it once it is on the medium.
    /// Runs under the log lock, so no two drainers commit the same record.
    /// `Ok(false)` when the queue is empty.
    fn commit_head(&self, engine: &mut LogEngine<M>) -> Result<bool> {
        let Some(record) = self.queue.peek() else {
            return Ok(false);
        };

        match engine.append(&record) {
            Ok(_) => {
                self.queue.pop();
                Ok(true)
            }
            Err(e @ LogError::StateStore(_)) => {
                // On the medium already; keeping it queued would append it twice.
                self.queue.pop();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn flush_queue(&self, engine: &mut LogEngine<M>) -> u32 {
        let mut flushed = 0;
        loop {
            match self.commit_head(engine) {
                Ok(true) => flushed += 1,
                Ok(false) => break,
                Err(LogError::StateStore(reason)) => {
                    warn!(%reason, "State not persisted during final flush");
                    flushed += 1;
                }
                Err(e) => {
                    warn!(error = %e, pending = self.queue.len(), "Final flush failed");
                    break;
                }
            }
        }
        flushed
    }

    fn check_record(&self, record: &[u8]) -> Result<()> {
        let record_size = self.record_size.load(Ordering::Acquire);
        if record_size == 0 {
            return Err(LogError::NotInitialized);
        }
        if record.len() != record_size as usize {
            return Err(LogError::InvalidParameter(format!(
                "record of {} bytes, log expects {record_size}",
                record.len()
            )));
        }
        Ok(())
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, Option<LogEngine<M>>>> {
        self.engine
            .try_lock_for(self.lock_wait)
            .ok_or(LogError::LockTimeout(self.lock_wait))
    }

    fn with_engine<T>(&self, op: impl FnOnce(&mut LogEngine<M>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock_engine()?;
        let result = match guard.as_mut() {
            Some(engine) => op(engine),
            None => Err(LogError::NotInitialized),
        };
        MutexGuard::unlock_fair(guard);
        result
    }

    fn signal(&self, signal: WorkerSignal) {
        if let Some(signals) = self.signals.lock().as_ref() {
            // A full channel already holds a wake-up for the worker.
            let _ = signals.try_send(signal);
        }
    }
}
