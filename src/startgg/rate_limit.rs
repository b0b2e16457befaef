use crate::prelude::*;

/// From https://dev.start.gg/docs/rate-limits:
///
/// > You may not average more than 80 requests per 60 seconds.
pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_millis(60_000 / 80);

/// Global pacing for every outbound call, shared by all workers.
///
/// Waiters queue on the mutex in arrival order, so only one caller passes per interval.
pub(crate) struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub(crate) async fn wait_for_slot(&self) {
        let mut next_slot = self.next_slot.lock().await;
        sleep_until(*next_slot).await;
        *next_slot = Instant::now() + self.interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(2));
        let start = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_spaced() {
        let interval = Duration::from_millis(600);
        let limiter = Arc::new(RateLimiter::new(interval));
        let handles = (0..6).map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.wait_for_slot().await;
                Instant::now()
            })
        }).collect_vec();
        let mut passed = Vec::default();
        for handle in handles {
            passed.push(handle.await.unwrap());
        }
        passed.sort();
        for pair in passed.windows(2) {
            assert!(pair[1] - pair[0] >= interval, "calls {:?} apart", pair[1] - pair[0]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_toward_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.wait_for_slot().await;
        sleep(Duration::from_secs(5)).await;
        let start = Instant::now();
        limiter.wait_for_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
