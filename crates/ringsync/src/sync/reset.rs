//! Ring resets: rebuild the synchronizer's view of a ring from hardware
//! state, never from the (possibly corrupted) shared ring.

use crossbeam_queue::ArrayQueue;
use tracing::{info, warn};

use ringsync_core::barrier::wmb;
use ringsync_core::hw::RxDesc;
use ringsync_core::ring::{RingIndexTranslator, SharedRing, Slot, SlotFlags};

use crate::error::RingFault;
use crate::kring::{KRing, RingId};
use crate::queue::{RxQueue, SyncRing, TxQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEvent {
    pub ring: RingId,
    /// `None` for resets requested from outside a sync call.
    pub fault: Option<RingFault>,
}

/// Bounded record of recent resets. Recording never blocks; when full the
/// oldest event is dropped.
pub struct ResetLog {
    events: ArrayQueue<ResetEvent>,
}

impl ResetLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: ArrayQueue::new(capacity.max(1)),
        }
    }

    pub fn record(&self, event: ResetEvent) {
        let _ = self.events.force_push(event);
    }

    pub fn drain(&self) -> Vec<ResetEvent> {
        std::iter::from_fn(|| self.events.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Force a transmit ring back to a consistent baseline.
///
/// Completions already written by the device are consumed first. What is
/// still in flight on the hardware ring is unavailable; the rest of the
/// ring goes back to the consumer. `hwofs` is realigned so that `hw_cur`
/// maps onto the hardware producer.
pub(crate) fn reset_tx(q: &mut TxQueue) {
    let Some(sync) = q.sync.as_mut() else {
        return;
    };
    let drained = super::reclaim::drain(&mut q.hw, &mut q.cq);

    let kring = &mut sync.kring;
    let lim = kring.lim();
    let inflight = q.hw.inflight_blocks().min(lim);
    if kring.hw_cur > lim {
        kring.hw_cur = 0;
    }
    kring.hw_avail = lim - inflight;
    kring.hwofs = RingIndexTranslator::aligned(kring.hw_cur, q.hw.prod(), lim).hwofs();

    renormalize(kring, &mut sync.ring, q.pool.buf_size());
    q.stats.resets += 1;
    q.stats.reclaimed += u64::from(drained.packets);
}

/// Force a receive ring back to a consistent baseline. Descriptors posted
/// and not yet imported belong to the device; everything else is the
/// consumer's, capped at `lim`.
pub(crate) fn reset_rx(q: &mut RxQueue) {
    let Some(sync) = q.sync.as_mut() else {
        return;
    };
    let kring = &mut sync.kring;
    let lim = kring.lim();
    let posted = q.hw.posted().min(kring.num_slots);
    if kring.hw_cur > lim {
        kring.hw_cur = 0;
    }
    kring.hw_avail = (kring.num_slots - posted).min(lim);
    kring.hwofs = RingIndexTranslator::aligned(kring.hw_cur, q.hw.prod(), lim).hwofs();
    kring.pending_intr = false;

    renormalize(kring, &mut sync.ring, q.pool.buf_size());
    q.stats.resets += 1;
}

fn renormalize(kring: &KRing, ring: &mut SharedRing, buf_size: u32) {
    for j in 0..kring.num_slots {
        let slot = ring.read_slot(j);
        if u32::from(slot.length) > buf_size {
            ring.store_len(j, 0);
        }
    }
    ring.set_reserved(0);
    ring.set_cur(kring.hw_cur);
    ring.publish_avail(kring.hw_avail);
    warn!(
        ring = %kring.id,
        hw_cur = kring.hw_cur,
        hw_avail = kring.hw_avail,
        hwofs = kring.hwofs,
        "ring reinitialized"
    );
}

fn load_slots(ring: &mut SharedRing, ids: &[u32]) {
    for (j, &id) in ids.iter().enumerate() {
        ring.write_slot(j as u32, Slot::new(id, 0, SlotFlags::empty()));
    }
}

/// Install a fresh shared ring on a transmit queue entering synchronized
/// mode. `ids` holds one buffer per slot. The port must be quiesced.
pub(crate) fn attach_tx(q: &mut TxQueue, mut ring: SharedRing, ids: Vec<u32>) {
    let num_slots = ring.num_slots();
    q.hw.reinit();
    q.cq.reinit();
    load_slots(&mut ring, &ids);

    let mut kring = KRing::new(q.id, num_slots);
    let lim = kring.lim();
    kring.hw_avail = lim - q.hw.inflight_blocks().min(lim);
    kring.hwofs = RingIndexTranslator::aligned(0, q.hw.prod(), lim).hwofs();
    ring.set_reserved(0);
    ring.set_cur(0);
    ring.publish_avail(kring.hw_avail);

    info!(ring = %q.id, slots = num_slots, "attached");
    q.sync = Some(SyncRing {
        kring,
        ring,
        owned: ids,
    });
}

/// Install a fresh shared ring on a receive queue and hand every slot's
/// buffer to the device.
pub(crate) fn attach_rx(q: &mut RxQueue, mut ring: SharedRing, ids: Vec<u32>) {
    let num_slots = ring.num_slots();
    q.hw.reinit();
    q.cq.reinit();
    load_slots(&mut ring, &ids);

    let mut kring = KRing::new(q.id, num_slots);
    let lim = kring.lim();
    let xlate = RingIndexTranslator::aligned(0, q.hw.prod(), lim);
    kring.hwofs = xlate.hwofs();

    let buf_size = q.pool.buf_size();
    let mut posted = 0;
    for (j, &id) in ids.iter().enumerate() {
        if let Some(paddr) = q.pool.resolve(id) {
            q.hw.write_desc(xlate.to_hw(j as u32), RxDesc::new(paddr, buf_size, q.hw.lkey()));
            posted += 1;
        }
    }
    wmb();
    q.hw.advance_prod(posted);
    q.hw.update_db_record();

    kring.hw_avail = (num_slots - posted.min(num_slots)).min(lim);
    ring.set_reserved(0);
    ring.set_cur(0);
    ring.publish_avail(kring.hw_avail);

    info!(ring = %q.id, slots = num_slots, posted, "attached");
    q.sync = Some(SyncRing {
        kring,
        ring,
        owned: ids,
    });
}

/// Tear down synchronized-mode state. Returns the buffers to give back.
pub(crate) fn detach_tx(q: &mut TxQueue) -> Vec<u32> {
    q.sync.take().map(|s| s.owned).unwrap_or_default()
}

pub(crate) fn detach_rx(q: &mut RxQueue) -> Vec<u32> {
    q.sync.take().map(|s| s.owned).unwrap_or_default()
}
