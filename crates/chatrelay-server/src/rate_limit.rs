use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MAX_IDLE: Duration = Duration::from_secs(180);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Per-client token bucket: `burst` tokens of capacity, refilled at `rps`
/// tokens per second, one token per request.
pub struct RateLimiter {
    rps: f64,
    burst: f64,
    clients: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(rps: u32, burst: u32) -> Self {
        Self {
            rps: f64::from(rps),
            burst: f64::from(burst),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = clients.entry(client.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Forget clients not seen for `max_idle`. Returns how many were dropped.
    pub fn evict_idle(&self, now: Instant, max_idle: Duration) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= max_idle);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Background task that evicts idle clients once a minute.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.evict_idle(Instant::now(), MAX_IDLE);
                if evicted > 0 {
                    tracing::debug!(evicted, "evicted idle rate-limit clients");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_block() {
        let limiter = RateLimiter::new(10, 2);
        let now = Instant::now();

        assert!(limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now));
    }

    #[test]
    fn test_refills_over_time() {
        let limiter = RateLimiter::new(10, 1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now + Duration::from_millis(50)));
        assert!(limiter.check_at("a", now + Duration::from_millis(160)));
    }

    #[test]
    fn test_refill_is_capped_at_burst() {
        let limiter = RateLimiter::new(100, 2);
        let now = Instant::now();
        limiter.check_at("a", now);

        let later = now + Duration::from_secs(60);
        assert!(limiter.check_at("a", later));
        assert!(limiter.check_at("a", later));
        assert!(!limiter.check_at("a", later));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, 1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
    }

    #[test]
    fn test_evict_idle_clients() {
        let limiter = RateLimiter::new(1, 1);
        let now = Instant::now();
        limiter.check_at("old", now);
        limiter.check_at("fresh", now + Duration::from_secs(170));

        let evicted = limiter.evict_idle(now + Duration::from_secs(200), MAX_IDLE);

        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
