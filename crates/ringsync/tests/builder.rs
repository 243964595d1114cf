#![cfg(feature = "simulator")]

use ringsync::simulator::{self, hw, SimNic};
use ringsync::{AdapterBuilder, LockMode, Poller, SyncError, MAX_SLOTS};
use ringsync_core::hw::{CompletionQueue, CountingDoorbell, HwRxRing, HwTxRing};

fn invalid(result: Result<impl Sized, SyncError>) -> String {
    match result {
        Err(SyncError::InvalidConfiguration(msg)) => msg,
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("configuration accepted"),
    }
}

#[test]
fn test_defaults() {
    let (adapter, probes) = simulator::adapter(SimNic::new("sim0"), 16, 2, 1).expect("adapter");
    assert_eq!(probes.len(), 2);
    assert_eq!(adapter.num_tx_rings(), 2);
    assert_eq!(adapter.num_rx_rings(), 1);
    assert!(adapter.config().no_pendintr);
    assert_eq!(adapter.config().poller, Poller::Adaptive);
    assert_eq!(adapter.pool().buf_size(), 2048);
    assert_eq!(adapter.pool().count(), 16 * 3 + 1);
}

#[test]
fn test_rejects_bad_ring_size() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 1, 1);
    let msg = invalid(builder.num_slots(12).build());
    assert!(msg.contains("power of two"));
}

#[test]
fn test_rejects_ring_beyond_hardware_index_width() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 1, 1);
    let msg = invalid(builder.num_slots(MAX_SLOTS * 2).build());
    assert!(msg.contains("at most"));

    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 1, 1);
    let msg = invalid(builder.num_slots(1 << 17).build());
    assert!(msg.contains("at most"));
}

#[test]
fn test_largest_ring_syncs_end_to_end() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), MAX_SLOTS, 1, 1);
    let adapter = builder.buf_size(64).build().expect("adapter");
    adapter.set_mode(true).expect("enable");
    let lim = MAX_SLOTS - 1;

    {
        let mut q = adapter.lock_tx(0).expect("tx0");
        let ring = q.ring_mut().expect("ring");
        for j in 0..lim {
            ring.store_len(j, 60);
        }
        ring.set_cur(lim);
    }
    let report = adapter.txsync(0, LockMode::AcquireInternally).expect("post");
    assert_eq!(report.posted, lim);

    assert_eq!(hw::complete_tx(&mut adapter.lock_tx(0).expect("tx0"), lim), lim);
    let report = adapter.txsync(0, LockMode::AcquireInternally).expect("reclaim");
    assert_eq!(report.reclaimed, lim);
    assert_eq!(adapter.lock_tx(0).expect("tx0").kring().expect("kring").hw_avail(), lim);

    // Every slot is posted; the device must still see them all.
    assert_eq!(adapter.lock_rx(0).expect("rx0").hw().posted(), MAX_SLOTS);
    assert_eq!(hw::deliver_rx(&mut adapter.lock_rx(0).expect("rx0"), &[60]), 1);
    let report = adapter.rxsync(0, LockMode::AcquireInternally).expect("import");
    assert_eq!(report.imported, 1);
    assert!(adapter.reset_log().is_empty());
}

#[test]
fn test_rejects_mismatched_hardware_ring() {
    let (bell, _) = CountingDoorbell::new();
    let result = AdapterBuilder::new(SimNic::new("sim0"))
        .num_slots(8)
        .tx_queue(HwTxRing::new(16, 0, 0), CompletionQueue::new(16), Box::new(bell))
        .build();
    assert!(invalid(result).starts_with("tx0"));
}

#[test]
fn test_rejects_oversized_buffers() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 1, 1);
    let msg = invalid(builder.buf_size(70_000).build());
    assert!(msg.contains("buf_size"));
}

#[test]
fn test_rejects_short_pool() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 1, 1);
    let msg = invalid(builder.num_buffers(10).build());
    assert!(msg.contains("17 buffers needed"));
}

#[test]
fn test_rejects_empty_device() {
    let msg = invalid(AdapterBuilder::new(SimNic::new("sim0")).num_slots(8).build());
    assert_eq!(msg, "no queues");
}

#[test]
fn test_queue_count_is_capped() {
    let (builder, _) = simulator::builder(SimNic::new("sim0"), 8, 6, 5);
    let adapter = builder.max_queues(4).build().expect("adapter");
    assert_eq!(adapter.num_tx_rings(), 4);
    assert_eq!(adapter.num_rx_rings(), 4);
    assert_eq!(adapter.pool().count(), 8 * 8 + 1);
}

#[test]
fn test_rx_only_device() {
    let adapter = AdapterBuilder::new(SimNic::new("sim0"))
        .num_slots(4)
        .buf_size(512)
        .rx_queue(HwRxRing::new(4, 1), CompletionQueue::new(4))
        .build()
        .expect("adapter");
    adapter.set_mode(true).expect("enable");
    assert_eq!(adapter.lock_rx(0).expect("rx0").hw().posted(), 4);
}
