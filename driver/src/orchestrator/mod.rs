// File: driver/src/orchestrator/mod.rs
//
// Pacing between demo phases. A run against the emulator normally goes as
// fast as transactions seal; pacing slows it down for a live audience.

/// Clock abstractions for pacing and for time control in tests
pub mod clock;

pub use clock::{Clock, PausedClock, SystemClock};

use std::sync::Arc;
use tokio::time::Duration;

/// How the executor paces a run
#[derive(Clone)]
pub struct Pacing {
    pub clock: Arc<dyn Clock>,
    /// Delay before each new phase starts; zero disables pacing
    pub phase_delay: Duration,
    /// Whether checkpoints wait for ENTER on stdin
    pub interactive: bool,
}

impl Pacing {
    /// No delays, no prompts
    pub fn immediate() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            phase_delay: Duration::ZERO,
            interactive: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_phase_delay(mut self, delay: Duration) -> Self {
        self.phase_delay = delay;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Sleep for the configured phase delay, if any
    pub async fn pause_between_phases(&self) {
        if !self.phase_delay.is_zero() {
            self.clock.sleep(self.phase_delay).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::immediate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_phase_delay_uses_injected_clock() {
        let clock = Arc::new(PausedClock::new());
        let pacing = Pacing::immediate()
            .with_clock(clock.clone())
            .with_phase_delay(Duration::from_secs(2));

        let start = clock.now();
        pacing.pause_between_phases().await;
        pacing.pause_between_phases().await;

        assert_eq!(clock.now() - start, Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_does_not_sleep() {
        let clock = Arc::new(PausedClock::new());
        let pacing = Pacing::immediate().with_clock(clock.clone());

        let start = clock.now();
        pacing.pause_between_phases().await;

        assert_eq!(clock.now() - start, Duration::ZERO);
        assert!(!pacing.interactive);
    }
}
