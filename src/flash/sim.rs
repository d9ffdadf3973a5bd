// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
// -----------------------------------------------------------------------
// Simulated Flash
// -----------------------------------------------------------------------
// RAM-backed NOR part. Clones share the same cells, so a test can keep a
// handle to inspect (or re-attach) the bytes after the log took ownership
// of another one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{describe_chip, program, sector_span, span, ChipInfo, DescribedRegion, ERASED};
use crate::geometry::LogGeometry;
use crate::memory::{FlashMemory, MemResult, MemoryFault, MemoryOp};

/// One operation performed on the simulated part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashEvent {
    Init,
    Describe,
    EraseAll,
    /// Base address of the erased sector.
    EraseSector(u32),
    Read(u32),
    Write(u32),
}

struct Cells {
    bytes: Vec<u8>,
    journal: Vec<FlashEvent>,
    faults: VecDeque<MemoryOp>,
    region: Option<DescribedRegion>,
    write_delay: Duration,
}

#[derive(Clone)]
pub struct SimulatedFlash {
    chip: ChipInfo,
    cells: Arc<Mutex<Cells>>,
}

impl SimulatedFlash {
    /// A fully erased part.
    pub fn new(chip: ChipInfo) -> Self {
        Self {
            chip,
            cells: Arc::new(Mutex::new(Cells {
                bytes: vec![ERASED; chip.capacity as usize],
                journal: Vec::new(),
                faults: VecDeque::new(),
                region: None,
                write_delay: Duration::ZERO,
            })),
        }
    }

    pub fn chip(&self) -> ChipInfo {
        self.chip
    }

    /// Makes the next `op` fail once. Queued faults fire in order of their
    /// operations, independent of each other.
    pub fn fail_next(&self, op: MemoryOp) {
        self.cells.lock().faults.push_back(op);
    }

    /// Programming latency applied to every write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.cells.lock().write_delay = delay;
    }

    /// Operations performed so far.
    pub fn journal(&self) -> Vec<FlashEvent> {
        self.cells.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.cells.lock().journal.clear();
    }

    /// Raw cell contents, bypassing the journal.
    pub fn peek(&self, addr: u32, len: usize) -> Vec<u8> {
        let cells = self.cells.lock();
        let start = addr as usize;
        cells.bytes[start..start + len].to_vec()
    }

    fn take_fault(cells: &mut Cells, op: MemoryOp) -> MemResult {
        if let Some(pos) = cells.faults.iter().position(|pending| *pending == op) {
            cells.faults.remove(pos);
            return Err(MemoryFault::new(format!("injected {op} fault")));
        }
        Ok(())
    }
}

impl FlashMemory for SimulatedFlash {
    fn init(&mut self) -> MemResult {
        let mut cells = self.cells.lock();
        cells.journal.push(FlashEvent::Init);
        Self::take_fault(&mut cells, MemoryOp::Init)
    }

    fn describe(&mut self, geometry: &mut LogGeometry) -> MemResult {
        let mut cells = self.cells.lock();
        cells.journal.push(FlashEvent::Describe);
        Self::take_fault(&mut cells, MemoryOp::Describe)?;
        cells.region = Some(describe_chip(&self.chip, geometry)?);
        Ok(())
    }

    fn erase_all(&mut self) -> MemResult {
        let mut cells = self.cells.lock();
        cells.journal.push(FlashEvent::EraseAll);
        Self::take_fault(&mut cells, MemoryOp::EraseAll)?;

        let range = match cells.region {
            Some(region) if !region.whole_device => {
                region.first_addr as usize..region.last_addr as usize + 1
            }
            _ => 0..cells.bytes.len(),
        };
        cells.bytes[range].fill(ERASED);
        Ok(())
    }

    fn erase_sector(&mut self, addr: u32) -> MemResult {
        let range = sector_span(&self.chip, addr)?;
        let mut cells = self.cells.lock();
        cells.journal.push(FlashEvent::EraseSector(range.start as u32));
        Self::take_fault(&mut cells, MemoryOp::EraseSector)?;
        cells.bytes[range].fill(ERASED);
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> MemResult {
        let range = span(self.chip.capacity, addr, buf.len())?;
        let mut cells = self.cells.lock();
        cells.journal.push(FlashEvent::Read(addr));
        Self::take_fault(&mut cells, MemoryOp::Read)?;
        buf.copy_from_slice(&cells.bytes[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> MemResult {
        let range = span(self.chip.capacity, addr, data.len())?;
        let delay = {
            let mut cells = self.cells.lock();
            cells.journal.push(FlashEvent::Write(addr));
            Self::take_fault(&mut cells, MemoryOp::Write)?;
            program(&mut cells.bytes[range], data);
            cells.write_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }
}
