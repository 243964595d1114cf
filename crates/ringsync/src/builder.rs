use std::sync::Arc;

use tracing::info;

use ringsync_core::buf::{BufLayout, BufferAllocator, BufferPool, DmaMapper, IdentityMapper};
use ringsync_core::hw::{CompletionQueue, Doorbell, HwRxRing, HwTxRing};

use crate::adapter::Adapter;
use crate::config::{AdapterConfig, Poller, MAX_SLOTS};
use crate::error::SyncError;
use crate::kring::RingId;
use crate::mode::{ModeController, NicDevice};
use crate::queue::{RxQueue, TxQueue};

struct TxParts {
    hw: HwTxRing,
    cq: CompletionQueue,
    doorbell: Box<dyn Doorbell>,
}

struct RxParts {
    hw: HwRxRing,
    cq: CompletionQueue,
}

/// Collects a device's hardware rings and settings into an [`Adapter`].
pub struct AdapterBuilder<D: NicDevice> {
    device: D,
    config: AdapterConfig,
    tx: Vec<TxParts>,
    rx: Vec<RxParts>,
    mapper: Option<Box<dyn DmaMapper>>,
}

impl<D: NicDevice> AdapterBuilder<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            config: AdapterConfig::default(),
            tx: Vec::new(),
            rx: Vec::new(),
            mapper: None,
        }
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn num_slots(mut self, n: u32) -> Self {
        self.config.num_slots = n;
        self
    }

    pub fn buf_size(mut self, size: u32) -> Self {
        self.config.buf_size = size;
        self
    }

    pub fn num_buffers(mut self, n: u32) -> Self {
        self.config.num_buffers = Some(n);
        self
    }

    pub fn no_pendintr(mut self, on: bool) -> Self {
        self.config.no_pendintr = on;
        self
    }

    pub fn max_queues(mut self, n: usize) -> Self {
        self.config.max_queues = n;
        self
    }

    pub fn reset_log_capacity(mut self, n: usize) -> Self {
        self.config.reset_log_capacity = n;
        self
    }

    pub fn poller(mut self, poller: Poller) -> Self {
        self.config.poller = poller;
        self
    }

    pub fn tx_queue(mut self, hw: HwTxRing, cq: CompletionQueue, doorbell: Box<dyn Doorbell>) -> Self {
        self.tx.push(TxParts { hw, cq, doorbell });
        self
    }

    pub fn rx_queue(mut self, hw: HwRxRing, cq: CompletionQueue) -> Self {
        self.rx.push(RxParts { hw, cq });
        self
    }

    pub fn dma_mapper(mut self, mapper: Box<dyn DmaMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn build(mut self) -> Result<Adapter<D>, SyncError> {
        let cfg = &self.config;

        // 1. Ring geometry
        if cfg.num_slots < 2 || !cfg.num_slots.is_power_of_two() {
            return Err(SyncError::InvalidConfiguration(format!(
                "num_slots must be a power of two >= 2, got {}",
                cfg.num_slots
            )));
        }
        if cfg.num_slots > MAX_SLOTS {
            return Err(SyncError::InvalidConfiguration(format!(
                "num_slots must be at most {MAX_SLOTS}, got {}",
                cfg.num_slots
            )));
        }
        if cfg.buf_size == 0 || cfg.buf_size > u32::from(u16::MAX) {
            return Err(SyncError::InvalidConfiguration(format!(
                "buf_size must be in 1..={}, got {}",
                u16::MAX,
                cfg.buf_size
            )));
        }
        if self.tx.is_empty() && self.rx.is_empty() {
            return Err(SyncError::InvalidConfiguration("no queues".to_string()));
        }

        // 2. Queue count
        let max = cfg.max_queues.max(1).min(usize::from(u16::MAX));
        if self.tx.len() > max || self.rx.len() > max {
            info!(
                device = self.device.name(),
                tx = self.tx.len(),
                rx = self.rx.len(),
                max,
                "limiting queue count"
            );
            self.tx.truncate(max);
            self.rx.truncate(max);
        }

        for (i, q) in self.tx.iter().enumerate() {
            if q.hw.size() != cfg.num_slots || q.cq.size() != cfg.num_slots {
                return Err(SyncError::InvalidConfiguration(format!(
                    "tx{i}: ring size {} / cq size {} does not match {} slots",
                    q.hw.size(),
                    q.cq.size(),
                    cfg.num_slots
                )));
            }
        }
        for (i, q) in self.rx.iter().enumerate() {
            if q.hw.size() != cfg.num_slots || q.cq.size() != cfg.num_slots {
                return Err(SyncError::InvalidConfiguration(format!(
                    "rx{i}: ring size {} / cq size {} does not match {} slots",
                    q.hw.size(),
                    q.cq.size(),
                    cfg.num_slots
                )));
            }
        }

        // 3. Buffer pool
        let required = cfg.required_buffers(self.tx.len(), self.rx.len());
        let count = match cfg.num_buffers {
            Some(n) if u64::from(n) < required => {
                return Err(SyncError::InvalidConfiguration(format!(
                    "{required} buffers needed, {n} configured"
                )));
            }
            Some(n) => u64::from(n),
            None => required,
        };
        let count = u32::try_from(count)
            .map_err(|_| SyncError::InvalidConfiguration(format!("{count} buffers do not fit the pool")))?;

        let layout = BufLayout::new(cfg.buf_size, count);
        let mapper = self.mapper.take().unwrap_or_else(|| Box::new(IdentityMapper));
        let pool = Arc::new(BufferPool::new(layout, mapper)?);

        // 4. Queues
        let tx = self
            .tx
            .into_iter()
            .enumerate()
            .map(|(i, p)| TxQueue::new(RingId::tx(i as u16), p.hw, p.cq, p.doorbell, pool.clone()))
            .collect();
        let rx = self
            .rx
            .into_iter()
            .enumerate()
            .map(|(i, p)| RxQueue::new(RingId::rx(i as u16), p.hw, p.cq, pool.clone()))
            .collect();

        let control = ModeController::new(self.device, BufferAllocator::new(layout));
        Ok(Adapter::new(self.config, control, tx, rx, pool))
    }
}
