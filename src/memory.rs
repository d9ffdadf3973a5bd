// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory interface consumed by the log engine.
//!
//! A linear, byte addressable, sector erasable store. Implementations do
//! not retry; a failure is reported once and the engine decides what to do.

use std::fmt;
use thiserror::Error;

use crate::geometry::LogGeometry;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MemoryFault(pub String);

impl MemoryFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type MemResult<T = ()> = Result<T, MemoryFault>;

/// Operations of the memory contract, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    Init,
    Describe,
    EraseAll,
    EraseSector,
    Read,
    Write,
}

impl fmt::Display for MemoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemoryOp::Init => "init",
            MemoryOp::Describe => "describe",
            MemoryOp::EraseAll => "erase-all",
            MemoryOp::EraseSector => "erase-sector",
            MemoryOp::Read => "read",
            MemoryOp::Write => "write",
        };
        f.write_str(name)
    }
}

pub trait FlashMemory: Send {
    /// Optional bring-up of the medium. The default does nothing.
    fn init(&mut self) -> MemResult {
        Ok(())
    }

    /// Fills in manufacturer/device ids and sector size, resolving the
    /// region bounds when the caller asked for the whole device.
    /// See [`LogGeometry::resolve_region`].
    fn describe(&mut self, geometry: &mut LogGeometry) -> MemResult;

    /// Erases the log region (or the whole device when no bounds were given).
    fn erase_all(&mut self) -> MemResult;

    /// Erases the sector containing `addr`.
    fn erase_sector(&mut self, addr: u32) -> MemResult;

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> MemResult;

    fn write(&mut self, addr: u32, data: &[u8]) -> MemResult;
}

impl<T: FlashMemory + ?Sized> FlashMemory for Box<T> {
    fn init(&mut self) -> MemResult {
        (**self).init()
    }

    fn describe(&mut self, geometry: &mut LogGeometry) -> MemResult {
        (**self).describe(geometry)
    }

    fn erase_all(&mut self) -> MemResult {
        (**self).erase_all()
    }

    fn erase_sector(&mut self, addr: u32) -> MemResult {
        (**self).erase_sector(addr)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> MemResult {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> MemResult {
        (**self).write(addr, data)
    }
}
