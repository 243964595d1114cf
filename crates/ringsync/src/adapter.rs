use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use ringsync_core::buf::BufferPool;

use crate::config::{AdapterConfig, LockMode};
use crate::error::{RingFault, SyncError};
use crate::kring::{Direction, RingId};
use crate::mode::{Capabilities, Mode, ModeController, NicDevice};
use crate::queue::{lock, RxQueue, TxQueue};
use crate::sync::reset::{self, ResetEvent, ResetLog};
use crate::sync::{rx, tx, RxReport, TxReport};

/// Per-device synchronization context.
///
/// Each ring sits behind its own lock. The control lock guarding the mode
/// controller is only taken by [`Adapter::set_mode`]; sync calls never wait
/// on it.
pub struct Adapter<D: NicDevice> {
    config: AdapterConfig,
    control: Mutex<ModeController<D>>,
    tx: Box<[Mutex<TxQueue>]>,
    rx: Box<[Mutex<RxQueue>]>,
    pool: Arc<BufferPool>,
    resets: ResetLog,
}

impl<D: NicDevice> Adapter<D> {
    pub(crate) fn new(
        config: AdapterConfig,
        control: ModeController<D>,
        tx: Vec<TxQueue>,
        rx: Vec<RxQueue>,
        pool: Arc<BufferPool>,
    ) -> Self {
        let resets = ResetLog::new(config.reset_log_capacity);
        Self {
            config,
            control: Mutex::new(control),
            tx: tx.into_iter().map(Mutex::new).collect(),
            rx: rx.into_iter().map(Mutex::new).collect(),
            pool,
            resets,
        }
    }

    /// Push the consumer's new transmit slots to the hardware and reclaim
    /// finished ones.
    ///
    /// A consumer that broke a ring invariant gets the ring reset and
    /// [`SyncError::RingReset`]; the next look at `avail` shows the rebuilt
    /// state.
    pub fn txsync(&self, ring: u16, lock_mode: LockMode<'_, TxQueue>) -> Result<TxReport, SyncError> {
        match lock_mode {
            LockMode::AcquireInternally => {
                let mut q = self.lock_tx(ring)?;
                self.txsync_locked(&mut q)
            }
            LockMode::CallerHolds(q) => {
                check_id(q.id, RingId::tx(ring))?;
                self.txsync_locked(q)
            }
        }
    }

    fn txsync_locked(&self, q: &mut TxQueue) -> Result<TxReport, SyncError> {
        if !q.is_synchronized() {
            return Err(SyncError::NotSynchronized(q.id));
        }
        tx::txsync(q).map_err(|fault| {
            reset::reset_tx(q);
            self.fault(q.id, fault)
        })
    }

    /// Import received packets into the shared ring and give the buffers
    /// the consumer released back to the device.
    ///
    /// Import runs on explicit requests, when `no_pendintr` is configured,
    /// or when an interrupt is pending on the ring.
    pub fn rxsync(&self, ring: u16, lock_mode: LockMode<'_, RxQueue>) -> Result<RxReport, SyncError> {
        let import = self.config.no_pendintr || lock_mode.is_internal();
        match lock_mode {
            LockMode::AcquireInternally => {
                let mut q = self.lock_rx(ring)?;
                self.rxsync_locked(&mut q, import)
            }
            LockMode::CallerHolds(q) => {
                check_id(q.id, RingId::rx(ring))?;
                self.rxsync_locked(q, import)
            }
        }
    }

    fn rxsync_locked(&self, q: &mut RxQueue, import: bool) -> Result<RxReport, SyncError> {
        if !q.is_synchronized() {
            return Err(SyncError::NotSynchronized(q.id));
        }
        rx::rxsync(q, import).map_err(|fault| {
            reset::reset_rx(q);
            self.fault(q.id, fault)
        })
    }

    fn fault(&self, ring: RingId, fault: RingFault) -> SyncError {
        warn!(%ring, %fault, "ring reset");
        self.resets.record(ResetEvent {
            ring,
            fault: Some(fault),
        });
        SyncError::RingReset { ring, fault }
    }

    /// Switch between native and synchronized operation. Calling it with
    /// the current mode is a no-op.
    pub fn set_mode(&self, enable: bool) -> Result<(), SyncError> {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        control.set_mode(enable, &self.tx, &self.rx)
    }

    /// Rebuild a ring's state from the hardware. Rings outside synchronized
    /// mode are left alone.
    pub fn reset_ring(&self, ring: RingId) -> Result<(), SyncError> {
        let synchronized = match ring.dir {
            Direction::Tx => {
                let mut q = self.lock_tx(ring.index)?;
                reset::reset_tx(&mut q);
                q.is_synchronized()
            }
            Direction::Rx => {
                let mut q = self.lock_rx(ring.index)?;
                reset::reset_rx(&mut q);
                q.is_synchronized()
            }
        };
        if synchronized {
            self.resets.record(ResetEvent { ring, fault: None });
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mode()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capabilities()
    }

    /// Run `f` on the device under the control lock.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        f(control.device_mut())
    }

    pub fn free_buffers(&self) -> usize {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .free_buffers()
    }

    pub fn lock_tx(&self, ring: u16) -> Result<MutexGuard<'_, TxQueue>, SyncError> {
        self.tx
            .get(usize::from(ring))
            .map(lock)
            .ok_or(SyncError::NoSuchRing(RingId::tx(ring)))
    }

    pub fn lock_rx(&self, ring: u16) -> Result<MutexGuard<'_, RxQueue>, SyncError> {
        self.rx
            .get(usize::from(ring))
            .map(lock)
            .ok_or(SyncError::NoSuchRing(RingId::rx(ring)))
    }

    pub fn num_tx_rings(&self) -> usize {
        self.tx.len()
    }

    pub fn num_rx_rings(&self) -> usize {
        self.rx.len()
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn reset_log(&self) -> &ResetLog {
        &self.resets
    }
}

fn check_id(held: RingId, requested: RingId) -> Result<(), SyncError> {
    if held == requested {
        Ok(())
    } else {
        Err(SyncError::NoSuchRing(requested))
    }
}
