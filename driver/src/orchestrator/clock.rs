// File: driver/src/orchestrator/clock.rs
//
// Clock abstraction used for demo pacing. Production runs sleep on real
// tokio time; tests run on a paused runtime and advance it by hand.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Time source for everything in the driver that waits
///
/// The executor never calls `tokio::time` directly, so a paced run can be
/// driven to completion in tests without real delays.
pub trait Clock: Send + Sync {
    /// Current instant (simulated under a paused runtime)
    fn now(&self) -> Instant;

    /// Sleep for `d`
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Real tokio time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Clock for tests on a paused runtime.
///
/// Expects the runtime to be started with
/// `#[tokio::test(start_paused = true)]`. Pending sleeps complete as soon as
/// the runtime is otherwise idle, or when [`PausedClock::advance`] moves time
/// past their deadline.
#[derive(Default)]
pub struct PausedClock;

impl PausedClock {
    pub fn new() -> Self {
        Self
    }

    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        time::Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}
