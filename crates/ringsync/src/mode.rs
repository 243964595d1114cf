use std::sync::Mutex;

use bitflags::bitflags;
use tracing::{debug, info, warn};

use ringsync_core::buf::BufferAllocator;
use ringsync_core::ring::SharedRing;

use crate::error::{DeviceError, SyncError};
use crate::queue::{lock, RxQueue, TxQueue};
use crate::sync::reset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The driver's own send and receive paths are installed.
    Native,
    /// Rings are served through the shared packet rings.
    Synchronized,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u32 {
        const SYNC_RINGS = 1 << 0;
    }
}

/// The device driver as seen from the mode controller.
///
/// `Ops` stands for the driver's send/receive entry points; the controller
/// swaps them on a mode change and hands the previous set back on the way
/// out.
pub trait NicDevice: Send {
    type Ops: Send;

    fn name(&self) -> &str;

    fn is_running(&self) -> bool;

    /// Stop the port and flush in-flight operations.
    fn stop_port(&mut self) -> Result<(), DeviceError>;

    fn start_port(&mut self) -> Result<(), DeviceError>;

    /// Entry points that route through the synchronizer.
    fn sync_ops(&self) -> Self::Ops;

    /// Install `ops` and return the set that was installed before.
    fn replace_ops(&mut self, ops: Self::Ops) -> Self::Ops;
}

/// Two-state machine switching a device between native and synchronized
/// operation. Lives behind the adapter's control lock, which also
/// serializes device start and stop.
pub struct ModeController<D: NicDevice> {
    device: D,
    mode: Mode,
    saved_ops: Option<D::Ops>,
    capenable: Capabilities,
    allocator: BufferAllocator,
}

impl<D: NicDevice> ModeController<D> {
    pub(crate) fn new(device: D, allocator: BufferAllocator) -> Self {
        Self {
            device,
            mode: Mode::Native,
            saved_ops: None,
            capenable: Capabilities::empty(),
            allocator,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capenable
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn free_buffers(&self) -> usize {
        self.allocator.available()
    }

    pub(crate) fn set_mode(
        &mut self,
        enable: bool,
        tx: &[Mutex<TxQueue>],
        rx: &[Mutex<RxQueue>],
    ) -> Result<(), SyncError> {
        let target = if enable {
            Mode::Synchronized
        } else {
            Mode::Native
        };
        if target == self.mode {
            debug!(device = self.device.name(), mode = ?target, "mode unchanged");
            return Ok(());
        }

        info!(
            device = self.device.name(),
            "setting synchronized mode to {}",
            if enable { "ON" } else { "OFF" }
        );

        let was_running = self.device.is_running();
        if was_running {
            self.device.stop_port().map_err(SyncError::DeviceBusy)?;
            info!(device = self.device.name(), "port stopped");
        }

        if enable {
            if let Err(e) = self.enter(tx, rx) {
                if was_running {
                    if let Err(restart) = self.device.start_port() {
                        warn!(device = self.device.name(), error = %restart, "restart after failed attach");
                    }
                }
                return Err(e);
            }
        } else {
            self.leave(tx, rx);
        }

        if was_running {
            self.device.start_port().map_err(SyncError::DeviceBusy)?;
            info!(device = self.device.name(), "port restarted");
        }
        Ok(())
    }

    fn enter(&mut self, tx: &[Mutex<TxQueue>], rx: &[Mutex<RxQueue>]) -> Result<(), SyncError> {
        if let Err(e) = self.attach_all(tx, rx) {
            self.detach_all(tx, rx);
            return Err(e);
        }

        let ops = self.device.sync_ops();
        self.saved_ops = Some(self.device.replace_ops(ops));
        self.capenable.insert(Capabilities::SYNC_RINGS);
        self.mode = Mode::Synchronized;
        Ok(())
    }

    fn attach_all(&mut self, tx: &[Mutex<TxQueue>], rx: &[Mutex<RxQueue>]) -> Result<(), SyncError> {
        for queue in tx {
            let mut q = lock(queue);
            let num_slots = q.hw.size();
            let ring = SharedRing::new_anon(num_slots)?;
            let ids = self
                .allocator
                .allocate_n(num_slots as usize)
                .ok_or(SyncError::OutOfBuffers)?;
            reset::attach_tx(&mut q, ring, ids);
        }
        for queue in rx {
            let mut q = lock(queue);
            let num_slots = q.hw.size();
            let ring = SharedRing::new_anon(num_slots)?;
            let ids = self
                .allocator
                .allocate_n(num_slots as usize)
                .ok_or(SyncError::OutOfBuffers)?;
            reset::attach_rx(&mut q, ring, ids);
        }
        Ok(())
    }

    fn leave(&mut self, tx: &[Mutex<TxQueue>], rx: &[Mutex<RxQueue>]) {
        if let Some(ops) = self.saved_ops.take() {
            self.device.replace_ops(ops);
        }
        self.capenable.remove(Capabilities::SYNC_RINGS);
        self.detach_all(tx, rx);
        self.mode = Mode::Native;
    }

    fn detach_all(&mut self, tx: &[Mutex<TxQueue>], rx: &[Mutex<RxQueue>]) {
        for queue in tx {
            let ids = reset::detach_tx(&mut lock(queue));
            self.allocator.release_all(ids);
        }
        for queue in rx {
            let ids = reset::detach_rx(&mut lock(queue));
            self.allocator.release_all(ids);
        }
    }
}
