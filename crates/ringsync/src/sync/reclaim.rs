use ringsync_core::barrier::wmb;
use ringsync_core::hw::{CompletionQueue, HwTxRing};

use crate::error::RingFault;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimed {
    /// Descriptors (packets) freed.
    pub packets: u32,
    /// Basic blocks the transmit consumer advanced by.
    pub blocks: u32,
    /// Completion entries consumed.
    pub completions: u32,
}

/// Consume every completion the device has written and free the transmit
/// descriptors they cover.
///
/// A completion back-references the last descriptor it covers; the walk
/// steps descriptor by descriptor from the last reclaimed point until it
/// lands on that index. A walk that would run past the descriptors in
/// flight means the completion is bogus: nothing is committed and the
/// fault is returned.
pub fn reclaim(hw: &mut HwTxRing, cq: &mut CompletionQueue) -> Result<Reclaimed, RingFault> {
    walk(hw, cq, true)
}

/// Like [`reclaim`], but a walk that runs out of in-flight descriptors
/// stops there and the remaining completions are discarded. Used when
/// rebuilding ring state after a fault.
pub(crate) fn drain(hw: &mut HwTxRing, cq: &mut CompletionQueue) -> Reclaimed {
    match walk(hw, cq, false) {
        Ok(done) => done,
        Err(_) => Reclaimed::default(),
    }
}

fn walk(hw: &mut HwTxRing, cq: &mut CompletionQueue, strict: bool) -> Result<Reclaimed, RingFault> {
    let size_mask = hw.size_mask();
    let inflight = hw.inflight_blocks();
    let mut cons_index = cq.cons_index();
    let mut ring_index = hw.cons() & size_mask;
    let mut last_nr_txbb = hw.last_nr_txbb();
    let mut txbbs_skipped: u32 = 0;
    let mut freed: u32 = 0;
    let mut done = Reclaimed::default();

    'cqes: while let Some(cqe) = cq.peek_at(cons_index) {
        let new_index = u32::from(cqe.wqe_index()) & size_mask;

        loop {
            if freed >= inflight {
                if strict {
                    return Err(RingFault::OverflowInvariant {
                        avail: freed.saturating_add(1),
                        lim: inflight,
                    });
                }
                cons_index = cons_index.wrapping_add(1);
                done.completions += 1;
                continue 'cqes;
            }
            txbbs_skipped += last_nr_txbb;
            ring_index = (ring_index + last_nr_txbb) & size_mask;
            last_nr_txbb = hw.nr_txbb_at(ring_index);
            freed += last_nr_txbb;
            done.packets += 1;
            if ring_index == new_index {
                break;
            }
        }

        cons_index = cons_index.wrapping_add(1);
        done.completions += 1;
    }

    // The completion queue consumer must move before the ring consumer, or
    // the device may overrun the completion queue.
    cq.commit(cons_index);
    wmb();
    hw.advance_cons(txbbs_skipped, last_nr_txbb);

    done.blocks = txbbs_skipped;
    Ok(done)
}
