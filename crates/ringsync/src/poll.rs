//! Drives periodic syncs for devices without interrupts, or for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::adapter::Adapter;
use crate::config::{LockMode, Poller};
use crate::error::SyncError;
use crate::mode::NicDevice;

pub struct PollLoop<'a, D: NicDevice> {
    adapter: &'a Adapter<D>,
    poller: Poller,
}

impl<'a, D: NicDevice> PollLoop<'a, D> {
    pub fn new(adapter: &'a Adapter<D>) -> Self {
        Self {
            adapter,
            poller: adapter.config().poller,
        }
    }

    pub fn with_poller(adapter: &'a Adapter<D>, poller: Poller) -> Self {
        Self { adapter, poller }
    }

    /// Sync every ring once. Returns the number of slots that moved in
    /// either direction.
    pub fn round(&self) -> Result<usize, SyncError> {
        round(self.adapter)
    }

    pub fn run(&self, stop: &AtomicBool) -> Result<(), SyncError> {
        match self.poller {
            Poller::Busy => loop {
                if stop.load(Ordering::Relaxed) {
                    break Ok(());
                }
                self.round()?;
            },
            Poller::Wait => loop {
                if stop.load(Ordering::Relaxed) {
                    break Ok(());
                }
                if self.round()? == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            },
            Poller::Adaptive => {
                let mut last_work = Instant::now();
                let spin_duration = Duration::from_micros(50);

                loop {
                    if stop.load(Ordering::Relaxed) {
                        break Ok(());
                    }
                    if self.round()? > 0 {
                        last_work = Instant::now();
                    } else if last_work.elapsed() > spin_duration {
                        std::thread::sleep(Duration::from_millis(1));
                    } else {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }
}

fn round<D: NicDevice>(adapter: &Adapter<D>) -> Result<usize, SyncError> {
    let mut work = 0;
    for i in 0..adapter.num_tx_rings() {
        match adapter.txsync(i as u16, LockMode::AcquireInternally) {
            Ok(report) => work += (report.posted + report.reclaimed) as usize,
            Err(SyncError::RingReset { .. }) | Err(SyncError::NotSynchronized(_)) => {}
            Err(e) => return Err(e),
        }
    }
    for i in 0..adapter.num_rx_rings() {
        match adapter.rxsync(i as u16, LockMode::AcquireInternally) {
            Ok(report) => work += (report.imported + report.released) as usize,
            Err(SyncError::RingReset { .. }) | Err(SyncError::NotSynchronized(_)) => {}
            Err(e) => return Err(e),
        }
    }
    trace!(work, "poll round");
    Ok(work)
}

#[cfg(feature = "async")]
pub use self::task::spawn_async;

#[cfg(feature = "async")]
mod task {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::task::JoinHandle;
    use tracing::warn;

    use crate::adapter::Adapter;
    use crate::mode::NicDevice;

    /// Run poll rounds on a tokio interval until `stop` is set.
    pub fn spawn_async<D>(adapter: Arc<Adapter<D>>, period: Duration, stop: Arc<AtomicBool>) -> JoinHandle<()>
    where
        D: NicDevice + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            while !stop.load(Ordering::Relaxed) {
                interval.tick().await;
                if let Err(e) = super::round(&adapter) {
                    warn!(error = %e, "poll round failed");
                    break;
                }
            }
        })
    }
}
