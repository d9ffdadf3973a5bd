// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! State-change sinks.
//!
//! The engine reports every new `(write_ptr, count)` pair through a
//! [`StateSink`]. Where the pair is kept is up to the embedder; [`StateFile`]
//! keeps it in a small sidecar file that can later seed `initialize`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc64fast::Digest;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometry::LogState;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct StoreFault(pub String);

pub trait StateSink: Send {
    fn store(&mut self, state: LogState) -> Result<(), StoreFault>;
}

impl<F> StateSink for F
where
    F: FnMut(LogState) -> Result<(), StoreFault> + Send,
{
    fn store(&mut self, state: LogState) -> Result<(), StoreFault> {
        self(state)
    }
}

/// Sink that keeps nothing. The log still works, but cannot recover its
/// position after a restart.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StateSink for NullSink {
    fn store(&mut self, _state: LogState) -> Result<(), StoreFault> {
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum StateFileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid magic bytes in state file")]
    InvalidMagic,
    #[error("Checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: u64, found: u64 },
}

const STATE_MAGIC: u32 = 0x5453_4C46; // "FLST"
const STATE_FILE_SIZE: usize = 24;

/// Sidecar file holding the last reported state.
///
/// Layout (little endian): magic u32, write_ptr u32, count u32,
/// reserved u32, crc64 u64 over the first 16 bytes.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads the stored state. `Ok(None)` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<LogState>, StateFileError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut buf = [0u8; STATE_FILE_SIZE];
        file.read_exact(&mut buf)?;

        let mut reader = &buf[..];
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != STATE_MAGIC {
            return Err(StateFileError::InvalidMagic);
        }
        let write_ptr = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u32::<LittleEndian>()?;
        let _reserved = reader.read_u32::<LittleEndian>()?;
        let expected = reader.read_u64::<LittleEndian>()?;

        let found = checksum(&buf[..16]);
        if found != expected {
            return Err(StateFileError::ChecksumMismatch { expected, found });
        }

        Ok(Some(LogState { write_ptr, count }))
    }

    /// Writes the state atomically: temp file, fsync, rename.
    pub fn save(&self, state: LogState) -> Result<(), StateFileError> {
        let mut buf = Vec::with_capacity(STATE_FILE_SIZE);
        buf.write_u32::<LittleEndian>(STATE_MAGIC)?;
        buf.write_u32::<LittleEndian>(state.write_ptr)?;
        buf.write_u32::<LittleEndian>(state.count)?;
        buf.write_u32::<LittleEndian>(0)?;
        let crc = checksum(&buf);
        buf.write_u64::<LittleEndian>(crc)?;

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StateSink for StateFile {
    fn store(&mut self, state: LogState) -> Result<(), StoreFault> {
        self.save(state).map_err(|e| StoreFault(e.to_string()))
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(bytes);
    digest.sum64()
}
