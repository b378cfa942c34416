use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Instant};

/// Caps remote calls at `max_calls` call-starts per `period`.
///
/// A permit is only handed back once `period` has elapsed since it was
/// acquired, so even calls that return instantly cannot push throughput past
/// `max_calls` per `period`.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    period: Duration,
    state: Arc<Mutex<LimiterState>>,
}

#[derive(Debug, Default)]
struct LimiterState {
    last_release: Option<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        RateLimiter {
            semaphore: Arc::new(Semaphore::new(max_calls)),
            period,
            state: Arc::new(Mutex::new(LimiterState::default())),
        }
    }

    /// SEC fair-access policy: 10 requests per second.
    pub fn edgar() -> Self {
        Self::new(10, Duration::from_secs(1))
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn last_release(&self) -> Option<Instant> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_release
    }

    pub async fn acquire(&self) -> RateLimitGuard {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore closed");

        RateLimitGuard {
            permit: Some(permit),
            started: Instant::now(),
            period: self.period,
            state: Arc::clone(&self.state),
        }
    }

    /// Runs `call` under a permit and always performs the delayed release,
    /// whatever the call returns.
    pub async fn throttle<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let guard = self.acquire().await;
        let output = call.await;
        guard.release().await;
        output
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::edgar()
    }
}

/// A held permit. Release it with [`RateLimitGuard::release`]; a guard that is
/// dropped instead still keeps its permit out of the pool until `period` has
/// passed since acquisition.
pub struct RateLimitGuard {
    permit: Option<OwnedSemaphorePermit>,
    started: Instant,
    period: Duration,
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimitGuard {
    fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.started.elapsed())
    }

    pub async fn release(mut self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            sleep(wait).await;
        }
        if let Some(permit) = self.permit.take() {
            return_permit(&self.state, permit);
        }
    }
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let wait = self.remaining();
        let state = Arc::clone(&self.state);
        match Handle::try_current() {
            Ok(handle) if !wait.is_zero() => {
                handle.spawn(async move {
                    sleep(wait).await;
                    return_permit(&state, permit);
                });
            }
            _ => return_permit(&state, permit),
        }
    }
}

fn return_permit(state: &Mutex<LimiterState>, permit: OwnedSemaphorePermit) {
    state
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .last_release = Some(Instant::now());
    drop(permit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_respect_period() {
        let limiter = RateLimiter::new(10, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..25 {
            limiter.throttle(async {}).await;
        }
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(limiter.available_permits(), 10);
        assert!(limiter.last_release().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_never_exceed_max_calls() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(1)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let limiter = Arc::clone(&limiter);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let guard = limiter.acquire().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                guard.release().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 10);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_call_still_releases_after_period() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        let result: Result<(), &str> = limiter.throttle(async { Err("boom") }).await;
        assert!(result.is_err());
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_guard_returns_permit_after_period() {
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        let guard = limiter.acquire().await;
        drop(guard);
        assert_eq!(limiter.available_permits(), 0);

        let _second = limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
