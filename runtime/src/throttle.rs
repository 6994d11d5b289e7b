//! Per-provider request spacing.
//!
//! Jurisdictions resolve concurrently, but each provider sees at most one
//! request start per `min_interval`, whatever the concurrency level.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use zoneatlas::ProviderKind;

pub struct ProviderThrottle {
    min_interval: Duration,
    last_start: DashMap<ProviderKind, Arc<Mutex<Option<Instant>>>>,
}

impl ProviderThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: DashMap::new(),
        }
    }

    /// Wait until `provider` may start another request, then claim the slot.
    pub async fn acquire(&self, provider: ProviderKind) {
        if self.min_interval.is_zero() {
            return;
        }
        // Clone the slot out so the map shard lock is not held across await.
        let slot = self.last_start.entry(provider).or_default().clone();
        let mut last = slot.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spacing_per_provider() {
        let throttle = Arc::new(ProviderThrottle::new(Duration::from_millis(40)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let t = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move { t.acquire(ProviderKind::Http).await }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_providers_are_independent() {
        let throttle = ProviderThrottle::new(Duration::from_millis(500));
        let start = Instant::now();
        throttle.acquire(ProviderKind::Http).await;
        throttle.acquire(ProviderKind::Browser).await;
        throttle.acquire(ProviderKind::RenderService).await;
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_zero_interval_never_waits() {
        let throttle = ProviderThrottle::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            throttle.acquire(ProviderKind::Http).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
