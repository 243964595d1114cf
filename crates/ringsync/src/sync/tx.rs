use tracing::{debug, trace};

use ringsync_core::barrier::wmb;
use ringsync_core::buf::DmaDirection;
use ringsync_core::hw::TxDesc;
use ringsync_core::ring::index::{distance, next};
use ringsync_core::ring::SlotFlags;

use crate::error::RingFault;
use crate::queue::TxQueue;
use crate::sync::reclaim::reclaim;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TxReport {
    pub posted: u32,
    pub reclaimed: u32,
    pub doorbell: bool,
}

/// Reconcile the consumer's view of a transmit ring with the hardware.
///
/// The consumer has filled slots up to `cur` (excluded); everything from
/// `hw_cur` to there is posted to the hardware ring, then finished
/// transmissions are reclaimed and `avail` is republished. Consumer-written
/// fields are read once and validated before they touch hardware state.
pub(crate) fn txsync(q: &mut TxQueue) -> Result<TxReport, RingFault> {
    let TxQueue {
        hw,
        cq,
        doorbell,
        pool,
        sync,
        stats,
        ..
    } = q;
    let Some(sync) = sync.as_mut() else {
        return Ok(TxReport::default());
    };
    let kring = &mut sync.kring;
    let ring = &mut sync.ring;

    let lim = kring.lim();
    let k = ring.load_cur();
    if k > lim {
        return Err(RingFault::InvalidIndex { index: k, lim });
    }
    if distance(kring.hw_cur, k, lim) > kring.hw_avail {
        return Err(RingFault::InvalidIndex { index: k, lim });
    }

    let mut report = TxReport::default();
    let mut fault = None;
    let xlate = kring.translator();
    let buf_size = pool.buf_size();
    let mut j = kring.hw_cur;

    if j != k {
        wmb();
        while j != k {
            let slot = ring.read_slot(j);
            let Some(mut paddr) = pool.resolve(slot.buffer_id) else {
                fault = Some(RingFault::InvalidSlot {
                    slot: j,
                    buffer_id: slot.buffer_id,
                    length: slot.length,
                });
                break;
            };
            if u32::from(slot.length) > buf_size {
                fault = Some(RingFault::InvalidSlot {
                    slot: j,
                    buffer_id: slot.buffer_id,
                    length: slot.length,
                });
                break;
            }

            let mut flags = slot.flags();
            flags.remove(SlotFlags::REPORT);
            if flags.contains(SlotFlags::BUF_CHANGED) {
                if let Some(addr) = pool.reload_map(slot.buffer_id, DmaDirection::ToDevice) {
                    paddr = addr;
                }
                flags.remove(SlotFlags::BUF_CHANGED);
            }
            if flags.bits() != slot.flags {
                ring.store_flags(j, flags);
            }

            let l = xlate.to_hw(j);
            debug_assert_eq!(l, hw.prod() & hw.size_mask());
            let owner = hw.prod() & hw.size() != 0;
            let desc = TxDesc::send(paddr, slot.length, hw.lkey(), owner);
            let blocks = desc.nr_txbb();
            hw.write_desc(l, desc);
            hw.advance_prod(blocks);

            j = next(j, lim);
            report.posted += 1;
        }

        if report.posted > 0 {
            kring.hw_cur = j;
            kring.hw_avail -= report.posted;
            wmb();
            doorbell.ring(hw.doorbell_qpn());
            report.doorbell = true;
            stats.doorbells += 1;
            stats.posted += u64::from(report.posted);
        }
    }
    if let Some(fault) = fault {
        return Err(fault);
    }

    let done = reclaim(hw, cq)?;
    if done.packets > 0 {
        let avail = kring.hw_avail.saturating_add(done.packets);
        if avail > lim {
            return Err(RingFault::OverflowInvariant { avail, lim });
        }
        if kring.hw_avail == 0 {
            debug!(ring = %kring.id, "tx ring restarted");
        }
        kring.hw_avail = avail;
        report.reclaimed = done.packets;
        stats.reclaimed += u64::from(done.packets);
    }

    ring.publish_avail(kring.hw_avail);
    if kring.hw_avail == 0 {
        debug!(ring = %kring.id, "tx ring full");
    }
    stats.syncs += 1;

    trace!(
        ring = %kring.id,
        posted = report.posted,
        reclaimed = report.reclaimed,
        hw_cur = kring.hw_cur,
        hw_avail = kring.hw_avail,
        "txsync"
    );
    Ok(report)
}
