//! Software NIC for tests and demos.
//!
//! [`SimNic`] plays the driver side of a mode change; the functions in
//! [`hw`] play the device side of the rings, on a queue the caller has
//! locked.

use ringsync_core::hw::{CompletionQueue, CountingDoorbell, DoorbellProbe, HwRxRing, HwTxRing};

use crate::adapter::Adapter;
use crate::builder::AdapterBuilder;
use crate::error::{DeviceError, SyncError};
use crate::mode::NicDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOps {
    Native,
    Synchronized,
}

pub struct SimNic {
    name: String,
    running: bool,
    ops: SimOps,
    fail_stop: bool,
    fail_start: bool,
    starts: u32,
    stops: u32,
}

impl SimNic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            running: false,
            ops: SimOps::Native,
            fail_stop: false,
            fail_start: false,
            starts: 0,
            stops: 0,
        }
    }

    /// A device whose port is already up.
    pub fn running(name: &str) -> Self {
        Self {
            running: true,
            ..Self::new(name)
        }
    }

    pub fn fail_next_stop(&mut self) {
        self.fail_stop = true;
    }

    pub fn fail_next_start(&mut self) {
        self.fail_start = true;
    }

    pub fn ops(&self) -> SimOps {
        self.ops
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }
}

impl NicDevice for SimNic {
    type Ops = SimOps;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stop_port(&mut self) -> Result<(), DeviceError> {
        if std::mem::take(&mut self.fail_stop) {
            return Err(DeviceError::Stop(format!("{}: port stuck", self.name)));
        }
        self.running = false;
        self.stops += 1;
        Ok(())
    }

    fn start_port(&mut self) -> Result<(), DeviceError> {
        if std::mem::take(&mut self.fail_start) {
            return Err(DeviceError::Start(format!("{}: link down", self.name)));
        }
        self.running = true;
        self.starts += 1;
        Ok(())
    }

    fn sync_ops(&self) -> SimOps {
        SimOps::Synchronized
    }

    fn replace_ops(&mut self, ops: SimOps) -> SimOps {
        std::mem::replace(&mut self.ops, ops)
    }
}

/// Builder preloaded with `num_tx` transmit and `num_rx` receive queues of
/// `num_slots` each. The probes observe the transmit doorbells in queue
/// order.
pub fn builder(
    nic: SimNic,
    num_slots: u32,
    num_tx: usize,
    num_rx: usize,
) -> (AdapterBuilder<SimNic>, Vec<DoorbellProbe>) {
    let mut builder = AdapterBuilder::new(nic).num_slots(num_slots).buf_size(2048);
    let mut probes = Vec::with_capacity(num_tx);
    for i in 0..num_tx {
        let (bell, probe) = CountingDoorbell::new();
        builder = builder.tx_queue(
            HwTxRing::new(num_slots, 0x100 + i as u32, 1),
            CompletionQueue::new(num_slots),
            Box::new(bell),
        );
        probes.push(probe);
    }
    for _ in 0..num_rx {
        builder = builder.rx_queue(HwRxRing::new(num_slots, 1), CompletionQueue::new(num_slots));
    }
    (builder, probes)
}

pub fn adapter(
    nic: SimNic,
    num_slots: u32,
    num_tx: usize,
    num_rx: usize,
) -> Result<(Adapter<SimNic>, Vec<DoorbellProbe>), SyncError> {
    let (builder, probes) = builder(nic, num_slots, num_tx, num_rx);
    Ok((builder.build()?, probes))
}

pub mod hw {
    use crate::queue::{RxQueue, TxQueue};

    /// Put up to `n` posted descriptors on the wire and write one
    /// completion per descriptor. Returns how many completed.
    pub fn complete_tx(q: &mut TxQueue, n: u32) -> u32 {
        let mut done = 0;
        while done < n {
            let Some(idx) = q.hw.hw_take_sent() else {
                break;
            };
            if !q.cq.hw_post(idx as u16, q.hw.desc(idx).byte_count()) {
                break;
            }
            done += 1;
        }
        done
    }

    /// Put up to `n` descriptors on the wire with a single moderated
    /// completion referencing the last one.
    pub fn complete_tx_batched(q: &mut TxQueue, n: u32) -> u32 {
        let mut last = None;
        let mut done = 0;
        while done < n {
            let Some(idx) = q.hw.hw_take_sent() else {
                break;
            };
            last = Some(idx);
            done += 1;
        }
        match last {
            Some(idx) if q.cq.hw_post(idx as u16, 0) => done,
            _ => 0,
        }
    }

    /// Frames posted and not yet reclaimed, oldest first.
    pub fn pending_tx_frames(q: &TxQueue) -> Vec<Vec<u8>> {
        let mask = q.hw.size_mask();
        let mut frames = Vec::new();
        let mut idx = q.hw.cons().wrapping_add(q.hw.last_nr_txbb());
        while idx != q.hw.prod() {
            let desc = q.hw.desc(idx & mask);
            let frame = q
                .pool
                .id_for_dma(desc.addr())
                .and_then(|id| q.pool.data(id))
                .map(|data| data[..(desc.byte_count() as usize).min(data.len())].to_vec())
                .unwrap_or_default();
            frames.push(frame);
            idx = idx.wrapping_add(desc.nr_txbb());
        }
        frames
    }

    /// Fill posted receive buffers with packets of the given lengths and
    /// write a completion for each. Stops early when the device runs out
    /// of posted descriptors.
    pub fn deliver_rx(q: &mut RxQueue, lengths: &[u32]) -> usize {
        let mut delivered = 0;
        for &len in lengths {
            let Some((idx, desc)) = q.hw.hw_take_posted() else {
                break;
            };
            let len = len.min(desc.byte_count());
            if !q.cq.hw_post(idx as u16, len) {
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Like [`deliver_rx`], copying each frame into the receive buffer.
    pub fn deliver_frames(q: &mut RxQueue, frames: &[&[u8]]) -> usize {
        let mut delivered = 0;
        for frame in frames {
            let Some((idx, desc)) = q.hw.hw_take_posted() else {
                break;
            };
            let written = q
                .pool
                .id_for_dma(desc.addr())
                .and_then(|id| q.pool.write(id, frame))
                .unwrap_or(0);
            if !q.cq.hw_post(idx as u16, written as u32) {
                break;
            }
            delivered += 1;
        }
        delivered
    }
}
