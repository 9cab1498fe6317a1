//! Monotonic time source for the engine.

use async_trait::async_trait;
use instant::{Duration, Instant};

/// Time as seen by the loader and the scheduler.
///
/// Milliseconds are relative to an arbitrary origin; only differences matter.
#[async_trait(?Send)]
pub trait Clock {
    fn now_ms(&self) -> u64;

    async fn sleep(&self, ms: u64);
}

/// Real clock backed by `instant` (performance.now() on the web)
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    async fn sleep(&self, ms: u64) {
        #[cfg(target_arch = "wasm32")]
        {
            gloo_timers::future::sleep(Duration::from_millis(ms)).await;
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
