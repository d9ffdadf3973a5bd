// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Bounded write-back queue.
//!
//! Producers push copies of records; the single drainer peeks the head,
//! commits it, and only then pops it. Records therefore stay queued until
//! they are on the medium.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{LogError, Result};

pub struct RecordQueue {
    slots: Mutex<VecDeque<Box<[u8]>>>,
    space: Condvar,
    capacity: usize,
}

impl RecordQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies `record` into the queue, waiting up to `wait` for a free slot.
    pub fn push(&self, record: &[u8], wait: Duration) -> Result<()> {
        let mut slots = self.slots.lock();

        if slots.len() >= self.capacity {
            if wait.is_zero() {
                return Err(LogError::QueueFull {
                    capacity: self.capacity,
                });
            }
            let deadline = Instant::now() + wait;
            while slots.len() >= self.capacity {
                if self.space.wait_until(&mut slots, deadline).timed_out()
                    && slots.len() >= self.capacity
                {
                    return Err(LogError::Timeout(wait));
                }
            }
        }

        slots.push_back(record.into());
        Ok(())
    }

    /// Copy of the oldest queued record.
    pub fn peek(&self) -> Option<Box<[u8]>> {
        self.slots.lock().front().cloned()
    }

    /// Removes the oldest queued record.
    pub fn pop(&self) -> Option<Box<[u8]>> {
        let record = self.slots.lock().pop_front();
        if record.is_some() {
            self.space.notify_one();
        }
        record
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Drops every queued record. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut slots = self.slots.lock();
            let dropped = slots.len();
            slots.clear();
            dropped
        };
        self.space.notify_all();
        dropped
    }
}
