//! Fixed-rate tick driver
//!
//! The loop is synchronous: [`Scheduler::run_until_cancelled`] runs one tick,
//! sleeps until the next deadline and repeats. Cancellation is cooperative and
//! observed only at tick boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Tick rate of the polling loop
pub const TICK_RATE_HZ: u32 = 90;

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Anything driven once per period
pub trait Tick {
    fn tick(&mut self) -> TickControl;
}

/// Shared stop flag. Cancelling more than once is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call performed the cancellation
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Cancelled,
    Stopped,
    TickLimit,
}

pub struct Scheduler {
    period: Duration,
    token: CancelToken,
    ticks: u64,
}

impl Scheduler {
    pub fn new(token: CancelToken) -> Self {
        Self::with_rate(token, TICK_RATE_HZ)
    }

    pub fn with_rate(token: CancelToken, rate_hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1))),
            token,
            ticks: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Run a single tick now, unless cancelled
    pub fn run_one_tick<T: Tick + ?Sized>(&mut self, target: &mut T) -> TickControl {
        if self.token.is_cancelled() {
            return TickControl::Stop;
        }
        self.ticks += 1;
        target.tick()
    }

    /// Tick once per period until cancelled, stopped, or `max_ticks` reached.
    /// Deadlines that were missed are skipped rather than replayed.
    pub fn run_until_cancelled<T: Tick + ?Sized>(
        &mut self,
        target: &mut T,
        max_ticks: Option<u64>,
    ) -> RunOutcome {
        info!(period_ms = self.period.as_secs_f64() * 1000.0, "tick loop started");
        let mut next_deadline = Instant::now();
        let mut ran = 0u64;

        let outcome = loop {
            if self.token.is_cancelled() {
                break RunOutcome::Cancelled;
            }
            if max_ticks.is_some_and(|max| ran >= max) {
                break RunOutcome::TickLimit;
            }

            if self.run_one_tick(target) == TickControl::Stop {
                break RunOutcome::Stopped;
            }
            ran += 1;

            next_deadline += self.period;
            let now = Instant::now();
            if next_deadline > now {
                std::thread::sleep(next_deadline - now);
            } else {
                let behind = now.duration_since(next_deadline);
                let skipped = (behind.as_nanos() / self.period.as_nanos().max(1)) as u32;
                if skipped > 0 {
                    debug!(skipped, "tick deadlines missed");
                }
                next_deadline += self.period * skipped;
            }
        };

        info!(ticks = ran, ?outcome, "tick loop ended");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        ticks: u32,
        stop_after: Option<u32>,
        cancel_after: Option<(u32, CancelToken)>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                ticks: 0,
                stop_after: None,
                cancel_after: None,
            }
        }
    }

    impl Tick for Counter {
        fn tick(&mut self) -> TickControl {
            self.ticks += 1;
            if let Some((n, token)) = &self.cancel_after
                && self.ticks == *n
            {
                token.cancel();
            }
            match self.stop_after {
                Some(n) if self.ticks >= n => TickControl::Stop,
                _ => TickControl::Continue,
            }
        }
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancelled_token_blocks_ticks() {
        let token = CancelToken::new();
        let mut scheduler = Scheduler::with_rate(token.clone(), 1000);
        let mut counter = Counter::new();

        token.cancel();

        assert_eq!(scheduler.run_one_tick(&mut counter), TickControl::Stop);
        assert_eq!(counter.ticks, 0);
    }

    #[test]
    fn stop_ends_the_loop() {
        let mut scheduler = Scheduler::with_rate(CancelToken::new(), 1000);
        let mut counter = Counter::new();
        counter.stop_after = Some(3);

        assert_eq!(scheduler.run_until_cancelled(&mut counter, None), RunOutcome::Stopped);
        assert_eq!(counter.ticks, 3);
    }

    #[test]
    fn cancellation_is_seen_at_the_next_boundary() {
        let token = CancelToken::new();
        let mut scheduler = Scheduler::with_rate(token.clone(), 1000);
        let mut counter = Counter::new();
        counter.cancel_after = Some((2, token));

        assert_eq!(scheduler.run_until_cancelled(&mut counter, None), RunOutcome::Cancelled);
        // the tick that cancelled completes; no further ticks run
        assert_eq!(counter.ticks, 2);
    }

    #[test]
    fn tick_limit() {
        let mut scheduler = Scheduler::with_rate(CancelToken::new(), 1000);
        let mut counter = Counter::new();

        assert_eq!(
            scheduler.run_until_cancelled(&mut counter, Some(5)),
            RunOutcome::TickLimit
        );
        assert_eq!(counter.ticks, 5);
        assert_eq!(scheduler.ticks(), 5);
    }

    #[test]
    fn default_rate_is_90hz() {
        let scheduler = Scheduler::new(CancelToken::new());
        let expected = Duration::from_secs_f64(1.0 / 90.0);
        assert_eq!(scheduler.period(), expected);
    }
}
