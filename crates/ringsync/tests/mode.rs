#![cfg(feature = "simulator")]

use ringsync::simulator::{self, SimNic, SimOps};
use ringsync::{Capabilities, DeviceError, LockMode, Mode, NicDevice, RingId, SyncError};

const SLOTS: u32 = 8;

#[test]
fn test_starts_native() {
    let (adapter, _) = simulator::adapter(SimNic::running("sim0"), SLOTS, 1, 1).expect("adapter");
    assert_eq!(adapter.mode(), Mode::Native);
    assert!(adapter.capabilities().is_empty());

    let err = adapter.txsync(0, LockMode::AcquireInternally).unwrap_err();
    assert!(matches!(err, SyncError::NotSynchronized(ring) if ring == RingId::tx(0)));
    let err = adapter.rxsync(0, LockMode::AcquireInternally).unwrap_err();
    assert!(matches!(err, SyncError::NotSynchronized(_)));
}

#[test]
fn test_enable_restarts_running_device() {
    let (adapter, _) = simulator::adapter(SimNic::running("sim0"), SLOTS, 2, 2).expect("adapter");
    let free = adapter.free_buffers();
    assert_eq!(free, 4 * SLOTS as usize);

    adapter.set_mode(true).expect("enable");
    assert_eq!(adapter.mode(), Mode::Synchronized);
    assert_eq!(adapter.capabilities(), Capabilities::SYNC_RINGS);
    assert_eq!(adapter.free_buffers(), 0);
    adapter.with_device(|nic| {
        assert_eq!(nic.ops(), SimOps::Synchronized);
        assert_eq!(nic.stops(), 1);
        assert_eq!(nic.starts(), 1);
        assert!(nic.is_running());
    });
    for i in 0..2 {
        assert!(adapter.lock_tx(i).expect("tx").is_synchronized());
        assert!(adapter.lock_rx(i).expect("rx").is_synchronized());
    }

    adapter.set_mode(false).expect("disable");
    assert_eq!(adapter.mode(), Mode::Native);
    assert!(adapter.capabilities().is_empty());
    assert_eq!(adapter.free_buffers(), free);
    adapter.with_device(|nic| {
        assert_eq!(nic.ops(), SimOps::Native);
        assert_eq!(nic.stops(), 2);
        assert_eq!(nic.starts(), 2);
    });
    assert!(!adapter.lock_tx(0).expect("tx").is_synchronized());
}

#[test]
fn test_stopped_device_stays_stopped() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(true).expect("enable");
    adapter.with_device(|nic| {
        assert_eq!(nic.stops(), 0);
        assert_eq!(nic.starts(), 0);
        assert!(!nic.is_running());
    });
}

#[test]
fn test_set_mode_is_idempotent() {
    let (adapter, _) = simulator::adapter(SimNic::running("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(false).expect("already native");
    adapter.set_mode(true).expect("enable");
    adapter.lock_tx(0).expect("tx0").ring().expect("ring").set_cur(3);
    adapter.set_mode(true).expect("enable again");

    // The second call must not rebuild the rings.
    assert_eq!(adapter.lock_tx(0).expect("tx0").ring().expect("ring").load_cur(), 3);
    adapter.with_device(|nic| assert_eq!(nic.stops(), 1));
}

#[test]
fn test_stop_failure_is_device_busy() {
    let (adapter, _) = simulator::adapter(SimNic::running("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.with_device(|nic| nic.fail_next_stop());

    let err = adapter.set_mode(true).unwrap_err();
    assert!(matches!(err, SyncError::DeviceBusy(DeviceError::Stop(_))));
    assert_eq!(adapter.mode(), Mode::Native);
    assert!(!adapter.lock_tx(0).expect("tx0").is_synchronized());
    adapter.with_device(|nic| assert_eq!(nic.ops(), SimOps::Native));

    adapter.set_mode(true).expect("retry by caller");
    assert_eq!(adapter.mode(), Mode::Synchronized);
}

#[test]
fn test_start_failure_is_device_busy() {
    let (adapter, _) = simulator::adapter(SimNic::running("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.with_device(|nic| nic.fail_next_start());

    let err = adapter.set_mode(true).unwrap_err();
    assert!(matches!(err, SyncError::DeviceBusy(DeviceError::Start(_))));
    // The switch happened; only the restart failed.
    assert_eq!(adapter.mode(), Mode::Synchronized);
    adapter.with_device(|nic| assert!(!nic.is_running()));
}

#[test]
fn test_reenable_gets_fresh_rings() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(true).expect("enable");
    {
        let mut q = adapter.lock_tx(0).expect("tx0");
        let ring = q.ring_mut().expect("ring");
        ring.store_len(0, 64);
        ring.set_cur(1);
    }
    adapter.txsync(0, LockMode::AcquireInternally).expect("txsync");

    adapter.set_mode(false).expect("disable");
    adapter.set_mode(true).expect("enable");

    let q = adapter.lock_tx(0).expect("tx0");
    assert_eq!(q.kring().expect("kring").hw_avail(), SLOTS - 1);
    assert_eq!(q.ring().expect("ring").load_cur(), 0);
    assert_eq!(q.hw().prod(), 0);
}

#[test]
fn test_explicit_reset_is_logged() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.reset_ring(RingId::rx(0)).expect("native ring");
    assert!(adapter.reset_log().is_empty());

    adapter.set_mode(true).expect("enable");
    adapter.reset_ring(RingId::rx(0)).expect("reset");
    let events = adapter.reset_log().drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fault, None);
    assert_eq!(adapter.lock_rx(0).expect("rx0").stats().resets, 1);

    let err = adapter.reset_ring(RingId::tx(9)).unwrap_err();
    assert!(matches!(err, SyncError::NoSuchRing(_)));
}

#[test]
fn test_unknown_ring() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(true).expect("enable");
    let err = adapter.txsync(3, LockMode::AcquireInternally).unwrap_err();
    assert!(matches!(err, SyncError::NoSuchRing(ring) if ring == RingId::tx(3)));
}
