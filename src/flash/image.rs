// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! File-backed flash image.
//!
//! The whole device is a memory-mapped file of `capacity` bytes. Erases and
//! writes are flushed to the file before returning.

use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use super::{describe_chip, program, sector_span, span, ChipInfo, DescribedRegion, ERASED};
use crate::geometry::LogGeometry;
use crate::memory::{FlashMemory, MemResult, MemoryFault};

pub struct ImageFlash {
    chip: ChipInfo,
    map: MmapMut,
    region: Option<DescribedRegion>,
}

impl ImageFlash {
    /// Creates (or truncates) an erased image of `chip.capacity` bytes.
    pub fn create(path: impl AsRef<Path>, chip: ChipInfo) -> io::Result<Self> {
        check_chip(chip)?;
        let path = path.as_ref();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            let sector = vec![ERASED; chip.sector_size as usize];
            for _ in 0..chip.capacity / chip.sector_size {
                file.write_all(&sector)?;
            }
            file.sync_all()?;
        }
        debug!(path = %path.display(), capacity = chip.capacity, "Created flash image");
        Self::open(path, chip)
    }

    /// Maps an existing image. Its length must match `chip.capacity`.
    pub fn open(path: impl AsRef<Path>, chip: ChipInfo) -> io::Result<Self> {
        check_chip(chip)?;
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let len = file.metadata()?.len();
        if len != chip.capacity as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image is {len} bytes, chip capacity is {}", chip.capacity),
            ));
        }

        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            chip,
            map,
            region: None,
        })
    }

    /// Maps an existing image, taking the capacity from its length.
    pub fn open_with_sector_size(path: impl AsRef<Path>, sector_size: u32) -> io::Result<Self> {
        let len = File::open(path.as_ref())?.metadata()?.len();
        let capacity = u32::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "image larger than 4 GiB")
        })?;
        Self::open(path, ChipInfo::new(capacity, sector_size))
    }

    pub fn chip(&self) -> ChipInfo {
        self.chip
    }

    fn flush(&self, range: std::ops::Range<usize>) -> MemResult {
        self.map
            .flush_range(range.start, range.len())
            .map_err(|e| MemoryFault::new(format!("flush failed: {e}")))
    }
}

impl FlashMemory for ImageFlash {
    fn describe(&mut self, geometry: &mut LogGeometry) -> MemResult {
        self.region = Some(describe_chip(&self.chip, geometry)?);
        Ok(())
    }

    fn erase_all(&mut self) -> MemResult {
        let range = match self.region {
            Some(region) if !region.whole_device => {
                region.first_addr as usize..region.last_addr as usize + 1
            }
            _ => 0..self.map.len(),
        };
        self.map[range.clone()].fill(ERASED);
        self.flush(range)
    }

    fn erase_sector(&mut self, addr: u32) -> MemResult {
        let range = sector_span(&self.chip, addr)?;
        self.map[range.clone()].fill(ERASED);
        self.flush(range)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> MemResult {
        let range = span(self.chip.capacity, addr, buf.len())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> MemResult {
        let range = span(self.chip.capacity, addr, data.len())?;
        program(&mut self.map[range.clone()], data);
        self.flush(range)
    }
}

fn check_chip(chip: ChipInfo) -> io::Result<()> {
    if chip.sector_size == 0 || chip.capacity % chip.sector_size != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "capacity {} is not a whole number of {}-byte sectors",
                chip.capacity, chip.sector_size
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_is_erased() {
        let dir = tempdir().unwrap();
        let mut flash = ImageFlash::create(dir.path().join("flash.img"), ChipInfo::new(8192, 4096)).unwrap();

        let mut buf = [0u8; 32];
        flash.read(4000, &mut buf).unwrap();
        assert!(buf.iter().all(|b| *b == ERASED));
    }

    #[test]
    fn test_write_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flash.img");
        let chip = ChipInfo::new(8192, 4096);
        {
            let mut flash = ImageFlash::create(&path, chip).unwrap();
            flash.write(4096, b"event").unwrap();
        }

        let mut flash = ImageFlash::open_with_sector_size(&path, 4096).unwrap();
        assert_eq!(flash.chip(), chip);
        let mut buf = [0u8; 5];
        flash.read(4096, &mut buf).unwrap();
        assert_eq!(&buf, b"event");

        flash.erase_sector(4100).unwrap();
        flash.read(4096, &mut buf).unwrap();
        assert_eq!(buf, [ERASED; 5]);
    }

    #[test]
    fn test_open_rejects_wrong_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flash.img");
        ImageFlash::create(&path, ChipInfo::new(8192, 4096)).unwrap();
        assert!(ImageFlash::open(&path, ChipInfo::new(16384, 4096)).is_err());
    }

    #[test]
    fn test_rejects_partial_sectors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flash.img");
        let err = ImageFlash::create(&path, ChipInfo::new(8192, 0)).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(ImageFlash::create(&path, ChipInfo::new(8192, 3000)).is_err());
        assert!(check_chip(ChipInfo::SST26VF064B).is_ok());

        ImageFlash::create(&path, ChipInfo::new(8192, 4096)).unwrap();
        let err = ImageFlash::open_with_sector_size(&path, 0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
