use tracing::{trace, warn};

use ringsync_core::barrier::{rmb, wmb};
use ringsync_core::buf::DmaDirection;
use ringsync_core::hw::RxDesc;
use ringsync_core::ring::index::{distance, next};
use ringsync_core::ring::SlotFlags;

use crate::error::RingFault;
use crate::queue::RxQueue;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RxReport {
    pub imported: u32,
    pub released: u32,
    pub reserved_clamped: bool,
}

/// Reconcile the consumer's view of a receive ring with the hardware.
///
/// First newly received packets are imported into the shared ring (when
/// `import` is set), then the buffers the consumer released, from `hw_cur`
/// up to `cur - reserved`, are handed back to the device.
pub(crate) fn rxsync(q: &mut RxQueue, import: bool) -> Result<RxReport, RingFault> {
    let RxQueue {
        hw,
        cq,
        pool,
        sync,
        stats,
        ..
    } = q;
    let Some(sync) = sync.as_mut() else {
        return Ok(RxReport::default());
    };
    let kring = &mut sync.kring;
    let ring = &mut sync.ring;

    let lim = kring.lim();
    let cur = ring.load_cur();
    if cur > lim {
        return Err(RingFault::InvalidIndex { index: cur, lim });
    }
    let mut resvd = ring.load_reserved();
    rmb();

    let mut report = RxReport::default();
    let xlate = kring.translator();
    let buf_size = pool.buf_size();

    // Import phase.
    if import || kring.pending_intr {
        let room = lim - kring.hw_avail;
        let mut cons_index = cq.cons_index();
        while report.imported < room {
            let Some(cqe) = cq.peek_at(cons_index) else {
                break;
            };
            let l = hw.cons() & hw.size_mask();
            let j = xlate.to_shared(l);
            let len = cqe.byte_cnt().min(buf_size) as u16;
            ring.store_len(j, len);
            ring.store_flags(j, SlotFlags::empty());

            hw.advance_cons(1);
            cons_index = cons_index.wrapping_add(1);
            report.imported += 1;
        }
        if report.imported > 0 {
            cq.commit(cons_index);
            kring.hw_avail += report.imported;
            stats.imported += u64::from(report.imported);
        }
        kring.pending_intr = false;
    }

    // Release phase.
    let mut j = kring.hw_cur;
    let advance = distance(j, cur, lim);
    if advance > kring.hw_avail {
        return Err(RingFault::InvalidIndex { index: cur, lim });
    }
    if resvd > 0 {
        let avail = ring.load_avail();
        if resvd.saturating_add(avail) > lim || resvd > advance {
            warn!(ring = %kring.id, resvd, avail, "invalid reserve/avail, clamping reserved");
            resvd = 0;
            ring.set_reserved(0);
            report.reserved_clamped = true;
        }
    }
    let k = cur.wrapping_sub(resvd) & lim;

    let mut fault = None;
    if j != k {
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
            let flags = slot.flags();
            if flags.contains(SlotFlags::BUF_CHANGED) {
                if let Some(addr) = pool.reload_map(slot.buffer_id, DmaDirection::FromDevice) {
                    paddr = addr;
                }
                ring.store_flags(j, flags - SlotFlags::BUF_CHANGED);
            }

            let l = xlate.to_hw(j);
            hw.write_desc(l, RxDesc::new(paddr, buf_size, hw.lkey()));

            j = next(j, lim);
            report.released += 1;
        }

        if report.released > 0 {
            kring.hw_avail -= report.released;
            kring.hw_cur = j;
            wmb();
            hw.advance_prod(report.released);
            hw.update_db_record();
            stats.released += u64::from(report.released);
        }
    }
    if let Some(fault) = fault {
        return Err(fault);
    }

    ring.publish_avail(kring.hw_avail.saturating_sub(resvd));
    stats.syncs += 1;

    trace!(
        ring = %kring.id,
        imported = report.imported,
        released = report.released,
        hw_cur = kring.hw_cur,
        hw_avail = kring.hw_avail,
        "rxsync"
    );
    Ok(report)
}
