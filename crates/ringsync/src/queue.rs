use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ringsync_core::buf::BufferPool;
use ringsync_core::hw::{CompletionQueue, Doorbell, HwRxRing, HwTxRing};
use ringsync_core::ring::SharedRing;

use crate::kring::{KRing, RingId};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RingStats {
    pub syncs: u64,
    pub posted: u64,
    pub reclaimed: u64,
    pub imported: u64,
    pub released: u64,
    pub doorbells: u64,
    pub resets: u64,
}

/// Shared ring plus the synchronizer state that exists only while the
/// adapter is in synchronized mode.
pub struct SyncRing {
    pub(crate) kring: KRing,
    pub(crate) ring: SharedRing,
    // Buffer ids handed out at attach, returned on detach.
    pub(crate) owned: Vec<u32>,
}

/// One transmit queue: the hardware ring, its completion queue and
/// doorbell, and the synchronized-mode state when present.
pub struct TxQueue {
    pub(crate) id: RingId,
    pub(crate) hw: HwTxRing,
    pub(crate) cq: CompletionQueue,
    pub(crate) doorbell: Box<dyn Doorbell>,
    pub(crate) pool: Arc<BufferPool>,
    pub(crate) sync: Option<SyncRing>,
    pub(crate) stats: RingStats,
}

impl TxQueue {
    pub(crate) fn new(
        id: RingId,
        hw: HwTxRing,
        cq: CompletionQueue,
        doorbell: Box<dyn Doorbell>,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            id,
            hw,
            cq,
            doorbell,
            pool,
            sync: None,
            stats: RingStats::default(),
        }
    }

    pub fn id(&self) -> RingId {
        self.id
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync.is_some()
    }

    pub fn hw(&self) -> &HwTxRing {
        &self.hw
    }

    pub fn cq(&self) -> &CompletionQueue {
        &self.cq
    }

    pub fn kring(&self) -> Option<&KRing> {
        self.sync.as_ref().map(|s| &s.kring)
    }

    pub fn ring(&self) -> Option<&SharedRing> {
        self.sync.as_ref().map(|s| &s.ring)
    }

    pub fn ring_mut(&mut self) -> Option<&mut SharedRing> {
        self.sync.as_mut().map(|s| &mut s.ring)
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn stats(&self) -> RingStats {
        self.stats
    }
}

pub struct RxQueue {
    pub(crate) id: RingId,
    pub(crate) hw: HwRxRing,
    pub(crate) cq: CompletionQueue,
    pub(crate) pool: Arc<BufferPool>,
    pub(crate) sync: Option<SyncRing>,
    pub(crate) stats: RingStats,
}

impl RxQueue {
    pub(crate) fn new(id: RingId, hw: HwRxRing, cq: CompletionQueue, pool: Arc<BufferPool>) -> Self {
        Self {
            id,
            hw,
            cq,
            pool,
            sync: None,
            stats: RingStats::default(),
        }
    }

    pub fn id(&self) -> RingId {
        self.id
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync.is_some()
    }

    /// Record that the device raised a receive interrupt; the next rxsync
    /// imports even when it runs on the caller-holds path.
    pub fn notify_interrupt(&mut self) {
        if let Some(sync) = self.sync.as_mut() {
            sync.kring.pending_intr = true;
        }
    }

    pub fn hw(&self) -> &HwRxRing {
        &self.hw
    }

    pub fn cq(&self) -> &CompletionQueue {
        &self.cq
    }

    pub fn kring(&self) -> Option<&KRing> {
        self.sync.as_ref().map(|s| &s.kring)
    }

    pub fn ring(&self) -> Option<&SharedRing> {
        self.sync.as_ref().map(|s| &s.ring)
    }

    pub fn ring_mut(&mut self) -> Option<&mut SharedRing> {
        self.sync.as_mut().map(|s| &mut s.ring)
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn stats(&self) -> RingStats {
        self.stats
    }
}

/// Ring state is plain cursors and counters, re-validated on every sync,
/// so a poisoned lock is still usable.
pub(crate) fn lock<Q>(queue: &Mutex<Q>) -> MutexGuard<'_, Q> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}
