#![cfg(feature = "simulator")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ringsync::poll::PollLoop;
use ringsync::simulator::{self, hw, SimNic};
use ringsync::{Adapter, Poller};

const SLOTS: u32 = 16;

fn produce(adapter: &Adapter<SimNic>, n: u32) {
    let mut q = adapter.lock_tx(0).expect("tx0");
    let ring = q.ring_mut().expect("ring");
    let cur = ring.load_cur();
    for k in 0..n {
        ring.store_len((cur + k) % SLOTS, 128);
    }
    ring.set_cur((cur + n) % SLOTS);
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn test_round_counts_work() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    let poll = PollLoop::new(&adapter);
    assert_eq!(poll.round().expect("native round"), 0);

    adapter.set_mode(true).expect("enable");
    produce(&adapter, 4);
    hw::deliver_rx(&mut adapter.lock_rx(0).expect("rx0"), &[64, 64]);
    assert_eq!(poll.round().expect("round"), 4 + 2);
    assert_eq!(poll.round().expect("idle round"), 0);
}

#[test]
fn test_round_survives_resets() {
    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(true).expect("enable");
    adapter
        .lock_tx(0)
        .expect("tx0")
        .ring()
        .expect("ring")
        .set_cur(SLOTS + 1);

    assert_eq!(PollLoop::new(&adapter).round().expect("round"), 0);
    assert_eq!(adapter.reset_log().len(), 1);
}

#[test]
fn test_run_until_stopped() {
    for poller in [Poller::Busy, Poller::Wait, Poller::Adaptive] {
        let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
        adapter.set_mode(true).expect("enable");
        let stop = AtomicBool::new(false);

        std::thread::scope(|s| {
            let worker = s.spawn(|| PollLoop::with_poller(&adapter, poller).run(&stop));

            produce(&adapter, 3);
            let posted = wait_for(Duration::from_secs(5), || {
                adapter.lock_tx(0).expect("tx0").stats().posted == 3
            });
            stop.store(true, Ordering::Relaxed);

            assert!(posted, "{poller:?} never synced");
            worker.join().expect("poll thread").expect("run");
        });
    }
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_poll() {
    use std::sync::Arc;

    let (adapter, _) = simulator::adapter(SimNic::new("sim0"), SLOTS, 1, 1).expect("adapter");
    adapter.set_mode(true).expect("enable");
    let adapter = Arc::new(adapter);
    let stop = Arc::new(AtomicBool::new(false));

    let task = ringsync::poll::spawn_async(adapter.clone(), Duration::from_millis(1), stop.clone());
    produce(&adapter, 2);
    for _ in 0..1000 {
        if adapter.lock_tx(0).expect("tx0").stats().posted == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    stop.store(true, Ordering::Relaxed);
    task.await.expect("poll task");

    assert_eq!(adapter.lock_tx(0).expect("tx0").stats().posted, 2);
}
