/// Largest ring the hardware indexes can address. Completion back-references
/// and the receive doorbell record are 16 bits wide, and a receive ring
/// posts every slot, so `num_slots` must stay below 2^16.
pub const MAX_SLOTS: u32 = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    /// Burns 100% CPU. Lowest latency.
    Busy,
    /// Sleeps after every idle round. Saves power.
    Wait,
    /// Spins for a bounded number of idle rounds, then sleeps.
    Adaptive,
}

/// How a sync entry point gets exclusive access to its ring.
pub enum LockMode<'a, Q> {
    /// Explicit request path: take the ring lock for the duration of the
    /// call.
    AcquireInternally,
    /// Interrupt or poll path: the caller already holds the ring.
    CallerHolds(&'a mut Q),
}

impl<Q> LockMode<'_, Q> {
    pub fn is_internal(&self) -> bool {
        matches!(self, LockMode::AcquireInternally)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub num_slots: u32,
    pub buf_size: u32,
    /// `None` sizes the pool to one buffer per slot plus the sentinel.
    pub num_buffers: Option<u32>,
    /// Import received packets on every rxsync instead of only after an
    /// interrupt or an explicit request.
    pub no_pendintr: bool,
    pub max_queues: usize,
    pub reset_log_capacity: usize,
    pub poller: Poller,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            num_slots: 1024,
            buf_size: 2048,
            num_buffers: None,
            no_pendintr: true,
            max_queues: 4,
            reset_log_capacity: 64,
            poller: Poller::Adaptive,
        }
    }
}

impl AdapterConfig {
    pub fn required_buffers(&self, num_tx: usize, num_rx: usize) -> u64 {
        u64::from(self.num_slots) * (num_tx + num_rx) as u64 + 1
    }
}
