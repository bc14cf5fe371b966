//! Pause between consecutive sends.
//!
//! Delivery within a sweep is strictly sequential; the pacer spaces the
//! sends out so the outbound pattern does not look automated.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;

/// Waits between two sends in the same sweep.
pub trait Pacer: Send + Sync {
    /// Suspend until the next send may start.
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Sleeps for a uniformly random interval in `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct JitterPacer {
    min: Duration,
    max: Duration,
}

impl JitterPacer {
    /// Create a pacer over `[min_ms, max_ms]` milliseconds.
    ///
    /// Bounds given in the wrong order are swapped.
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            min: Duration::from_millis(lo),
            max: Duration::from_millis(hi),
        }
    }

    /// Draw the next delay.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let mut rng = rand::thread_rng();
        rng.gen_range(self.min..=self.max)
    }
}

impl Pacer for JitterPacer {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let delay = self.next_delay();
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Pacer that never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

impl Pacer for NoPacer {
    fn pause(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}
