// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::LogConfig;
use crate::error::LogError;
use crate::flash::{FlashEvent, SimulatedFlash, ERASED};
use crate::geometry::{LogSnapshot, LogState};
use crate::log::EventLog;
use crate::memory::MemoryOp;
use crate::store::{NullSink, StoreFault};
use crate::tests::{open, open_fresh, record, record_id, small_chip, small_config};

#[test]
fn test_initialize_fresh() {
    let h = open_fresh(&small_config(), small_chip());
    let snapshot = h.log.snapshot().unwrap();

    assert_eq!(snapshot.geometry.record_size, 16);
    assert_eq!(snapshot.geometry.sector_size, 64);
    assert_eq!(snapshot.geometry.records_per_sector, 4);
    assert_eq!(snapshot.geometry.max_records, 16);
    assert_eq!(snapshot.geometry.first_addr, 0);
    assert_eq!(snapshot.geometry.last_addr, 255);
    assert_eq!(snapshot.state, LogState::new(0, 0));
    assert_eq!(h.flash.journal(), vec![FlashEvent::Init, FlashEvent::Describe]);
    assert!(h.reported.lock().is_empty());
}

#[test]
fn test_append_monotonic() {
    let h = open_fresh(&small_config(), small_chip());

    for i in 0..12 {
        h.log.commit_sync(&record(i, 16)).unwrap();
        assert_eq!(h.log.read_record(0).unwrap(), record(i, 16));
        assert_eq!(h.state().count, i + 1);
    }
    for i in 0..12 {
        assert_eq!(h.log.read_record(i).unwrap(), record(11 - i, 16));
    }
}

#[test]
fn test_erase_before_write_on_boundary() {
    // Two sectors already written; the cursor sits on the third.
    let config = small_config().with_seed(LogState::new(128, 8));
    let h = open_fresh(&config, small_chip());
    assert_eq!(h.state(), LogState::new(128, 8));
    h.flash.clear_journal();

    h.log.commit_sync(&record(8, 16)).unwrap();
    assert_eq!(
        h.flash.journal(),
        vec![FlashEvent::EraseSector(128), FlashEvent::Write(128)]
    );

    h.flash.clear_journal();
    h.log.commit_sync(&record(9, 16)).unwrap();
    assert_eq!(h.flash.journal(), vec![FlashEvent::Write(144)]);
}

#[test]
fn test_read_not_found() {
    let h = open_fresh(&small_config(), small_chip());
    assert_eq!(
        h.log.read_record(0),
        Err(LogError::NotFound { index: 0, count: 0 })
    );

    for i in 0..3 {
        h.log.commit_sync(&record(i, 16)).unwrap();
    }
    assert_eq!(
        h.log.read_record(3),
        Err(LogError::NotFound { index: 3, count: 3 })
    );
}

#[test]
fn test_write_failure_leaves_state() {
    let h = open_fresh(&small_config(), small_chip());
    h.log.commit_sync(&record(0, 16)).unwrap();
    let before = h.state();

    h.flash.fail_next(MemoryOp::Write);
    let err = h.log.commit_sync(&record(1, 16)).unwrap_err();
    assert!(matches!(err, LogError::Flash { op: MemoryOp::Write, addr: 16, .. }));
    assert_eq!(h.state(), before);
    assert_eq!(h.last_reported(), Some(before));

    h.log.commit_sync(&record(1, 16)).unwrap();
    assert_eq!(h.log.read_record(0).unwrap(), record(1, 16));
}

#[test]
fn test_write_failure_on_full_ring_keeps_records() {
    let h = open_fresh(&small_config(), small_chip());
    for i in 0..16 {
        h.log.commit_sync(&record(i, 16)).unwrap();
    }
    let before = h.state();
    assert_eq!(before, LogState::new(0, 16));

    // The erase succeeds, the write does not.
    h.flash.fail_next(MemoryOp::Write);
    assert!(matches!(
        h.log.commit_sync(&record(16, 16)),
        Err(LogError::Flash { op: MemoryOp::Write, addr: 0, .. })
    ));
    assert_eq!(h.state(), before);
    assert_eq!(record_id(&h.log.read_record(0).unwrap()), 15);

    h.flash.clear_journal();
    h.log.commit_sync(&record(16, 16)).unwrap();
    assert_eq!(
        h.flash.journal(),
        vec![FlashEvent::EraseSector(0), FlashEvent::Write(0)]
    );
    assert_eq!(h.state(), LogState::new(16, 13));
    assert_eq!(record_id(&h.log.read_record(0).unwrap()), 16);
    assert_eq!(record_id(&h.log.read_record(12).unwrap()), 4);
}

#[test]
fn test_erase_failure_leaves_state() {
    let h = open_fresh(&small_config(), small_chip());

    h.flash.fail_next(MemoryOp::EraseSector);
    let err = h.log.commit_sync(&record(0, 16)).unwrap_err();
    assert!(matches!(err, LogError::Flash { op: MemoryOp::EraseSector, addr: 0, .. }));
    assert_eq!(h.state(), LogState::new(0, 0));
    assert!(h.reported.lock().is_empty());
    assert!(!h.flash.journal().contains(&FlashEvent::Write(0)));
}

#[test]
fn test_sync_commit_reports_before_returning() {
    let h = open_fresh(&small_config(), small_chip());

    for i in 0..5 {
        let state = h.log.commit_sync(&record(i, 16)).unwrap();
        assert_eq!(h.last_reported(), Some(state));
        assert_eq!(h.state(), state);
    }
    assert_eq!(h.last_reported(), Some(LogState::new(80, 5)));
}

#[test]
fn test_clear() {
    let h = open_fresh(&small_config(), small_chip());
    for i in 0..6 {
        h.log.commit_sync(&record(i, 16)).unwrap();
    }

    h.log.clear().unwrap();

    assert_eq!(h.state(), LogState::new(0, 0));
    assert_eq!(h.last_reported(), Some(LogState::new(0, 0)));
    assert!(matches!(h.log.read_record(0), Err(LogError::NotFound { .. })));
    assert!(h.flash.peek(0, 256).iter().all(|b| *b == ERASED));
}

#[test]
fn test_clear_failure() {
    let h = open_fresh(&small_config(), small_chip());
    h.log.commit_sync(&record(0, 16)).unwrap();

    h.flash.fail_next(MemoryOp::EraseAll);
    assert!(matches!(
        h.log.clear(),
        Err(LogError::Flash { op: MemoryOp::EraseAll, .. })
    ));
    assert_eq!(h.state().count, 1);
}

#[test]
fn test_uninitialize() {
    let h = open_fresh(&small_config(), small_chip());
    h.log.commit_sync(&record(0, 16)).unwrap();

    assert!(h.log.uninitialize().memory.is_some());
    assert!(!h.log.is_initialized());

    let rec = record(1, 16);
    assert_eq!(h.log.commit_sync(&rec), Err(LogError::NotInitialized));
    assert_eq!(h.log.enqueue(&rec), Err(LogError::NotInitialized));
    assert_eq!(h.log.drain(10), Err(LogError::NotInitialized));
    assert_eq!(h.log.clear(), Err(LogError::NotInitialized));
    assert_eq!(h.log.read_record(0), Err(LogError::NotInitialized));
    assert_eq!(h.log.read_next(&mut [0u8; 16]), Err(LogError::NotInitialized));
    assert_eq!(h.log.snapshot().unwrap(), LogSnapshot::default());

    assert!(h.log.uninitialize().memory.is_none());
}

#[test]
fn test_initialize_rejects_bad_geometry() {
    // Larger than a sector.
    let config = LogConfig { record_size: 128, ..small_config() };
    assert!(matches!(
        EventLog::initialize(&config, SimulatedFlash::new(small_chip()), NullSink),
        Err(LogError::InvalidParameter(_))
    ));

    // Does not divide the sector.
    let config = LogConfig { record_size: 24, ..small_config() };
    assert!(matches!(
        EventLog::initialize(&config, SimulatedFlash::new(small_chip()), NullSink),
        Err(LogError::InvalidParameter(_))
    ));

    let config = LogConfig { record_size: 0, ..small_config() };
    assert!(matches!(
        EventLog::initialize(&config, SimulatedFlash::new(small_chip()), NullSink),
        Err(LogError::InvalidParameter(_))
    ));
}

#[test]
fn test_initialize_memory_errors() {
    let flash = SimulatedFlash::new(small_chip());
    flash.fail_next(MemoryOp::Init);
    assert!(matches!(
        EventLog::initialize(&small_config(), flash, NullSink),
        Err(LogError::Memory(_))
    ));

    let flash = SimulatedFlash::new(small_chip());
    flash.fail_next(MemoryOp::Describe);
    assert!(matches!(
        EventLog::initialize(&small_config(), flash, NullSink),
        Err(LogError::Memory(_))
    ));

    // Region not sector aligned.
    let config = LogConfig { first_valid_addr: 32, ..small_config() };
    assert!(matches!(
        EventLog::initialize(&config, SimulatedFlash::new(small_chip()), NullSink),
        Err(LogError::Memory(_))
    ));

    // Region beyond the device.
    let config = LogConfig { region_size: Some(2048), ..small_config() };
    assert!(matches!(
        EventLog::initialize(&config, SimulatedFlash::new(small_chip()), NullSink),
        Err(LogError::Memory(_))
    ));
}

#[test]
fn test_whole_device_region() {
    let config = LogConfig { region_size: None, ..small_config() };
    let h = open_fresh(&config, small_chip());
    let geometry = h.log.snapshot().unwrap().geometry;
    assert_eq!(geometry.last_addr, 1023);
    assert_eq!(geometry.max_records, 64);
}

#[test]
fn test_record_size_checked() {
    let h = open_fresh(&small_config(), small_chip());
    assert!(matches!(
        h.log.commit_sync(&[0u8; 15]),
        Err(LogError::InvalidParameter(_))
    ));
    assert!(matches!(
        h.log.enqueue(&[0u8; 17]),
        Err(LogError::InvalidParameter(_))
    ));

    h.log.commit_sync(&record(0, 16)).unwrap();
    let mut short = [0u8; 8];
    assert!(matches!(
        h.log.read(0, &mut short),
        Err(LogError::InvalidParameter(_))
    ));

    // Larger buffers are fine; only the front is filled.
    let mut long = [0u8; 32];
    h.log.read(0, &mut long).unwrap();
    assert_eq!(&long[..16], &record(0, 16)[..]);
    assert_eq!(&long[16..], &[0u8; 16]);
}

#[test]
fn test_offset_region() {
    // Region of 16 slots starting four sectors into the part.
    let config = LogConfig {
        first_valid_addr: 256,
        seed_write_ptr: 256,
        ..small_config()
    };
    let h = open_fresh(&config, small_chip());
    assert_eq!(h.state(), LogState::new(256, 0));

    for i in 0..21 {
        h.log.commit_sync(&record(i, 16)).unwrap();
    }

    let state = h.state();
    assert_eq!(state.count, 13);
    assert_eq!(state.write_ptr, 256 + 5 * 16);
    for i in 0..state.count {
        assert_eq!(h.log.read_record(i).unwrap(), record(20 - i, 16));
    }

    assert!(h.flash.peek(0, 256).iter().all(|b| *b == ERASED));
    assert!(h.flash.peek(512, 512).iter().all(|b| *b == ERASED));
}

#[test]
fn test_state_store_failure_surfaces() {
    let flash = SimulatedFlash::new(small_chip());
    let mut fail = true;
    let sink = move |_state: LogState| -> Result<(), StoreFault> {
        if std::mem::take(&mut fail) {
            Err(StoreFault("register busy".into()))
        } else {
            Ok(())
        }
    };
    let log = EventLog::initialize(&small_config(), flash, sink).unwrap();

    assert!(matches!(
        log.commit_sync(&record(0, 16)),
        Err(LogError::StateStore(_))
    ));
    // The record itself made it.
    assert_eq!(log.read_record(0).unwrap(), record(0, 16));

    log.commit_sync(&record(1, 16)).unwrap();
    assert_eq!(log.snapshot().unwrap().state, LogState::new(32, 2));
}

#[test]
fn test_physical_addresses() {
    let h = open_fresh(&small_config(), small_chip());
    for i in 0..17 {
        h.log.commit_sync(&record(i, 16)).unwrap();
    }
    // Record 16 went to slot 0 after sector 0 was erased.
    assert_eq!(h.flash.peek(0, 16), record(16, 16));
    assert!(h.flash.peek(16, 48).iter().all(|b| *b == ERASED));
    assert_eq!(h.log.read_record(0).unwrap(), record(16, 16));
    assert_eq!(h.log.read_record(12).unwrap(), record(4, 16));
}

#[test]
fn test_open_with_shared_flash() {
    let flash = SimulatedFlash::new(small_chip());
    let h = open(&small_config(), &flash);
    h.log.commit_sync(&record(7, 16)).unwrap();
    assert_eq!(flash.peek(0, 16), record(7, 16));
}
