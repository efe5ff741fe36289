//! Politeness primitives for external origins
//!
//! Two flavors are used:
//!
//! - [`TokenBucket`]: steady rate + burst capacity, shared by the enrichment
//!   worker pool. Backed by `governor`.
//! - [`SlotPacer`]: a next-permissible-instant pacer for the single-threaded
//!   browse/ingest paths; a caller arriving early sleeps to the slot and then
//!   advances it by one inter-request interval.

use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Token bucket limiter: `rps` steady requests per second with `burst`
/// capacity. Acquire is asynchronous and waits for the next token.
pub struct TokenBucket {
    limiter: governor::RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
    rps: u32,
    burst: u32,
}

impl TokenBucket {
    pub fn new(rps: u32, burst: u32) -> Self {
        let rps = rps.max(1);
        let burst = burst.max(1);
        let quota = governor::Quota::per_second(NonZeroU32::new(rps).unwrap())
            .allow_burst(NonZeroU32::new(burst).unwrap());
        Self {
            limiter: governor::RateLimiter::direct(quota),
            rps,
            burst,
        }
    }

    /// Wait until a token is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn rps(&self) -> u32 {
        self.rps
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}

/// Next-slot pacer: serializes callers onto a 1/rps grid.
pub struct SlotPacer {
    min_interval: Duration,
    next: Mutex<Option<Instant>>,
}

impl SlotPacer {
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rps as f64),
            next: Mutex::new(None),
        }
    }

    /// Sleep until the next permissible instant, then claim it.
    pub async fn wait(&self) {
        let sleep_until = {
            let mut next = self.next.lock().expect("slot pacer lock poisoned");
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(sleep_until).await;
    }
}
