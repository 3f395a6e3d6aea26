use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// A permit that holds both global and per-host semaphore permits.
pub struct ThrottlePermit {
    _global: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
}

/// Two-level connection limiter: one global budget for local sockets and
/// one budget per target host.
pub struct Throttle {
    global: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    default_per_host: usize,
}

impl Throttle {
    pub fn new(global_limit: usize, default_per_host: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit.max(1))),
            per_host: DashMap::new(),
            default_per_host: default_per_host.max(1),
        }
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        self.per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.default_per_host)))
            .value()
            .clone()
    }

    /// Wait for a host slot, then a global slot.
    ///
    /// Host first so a single slow target cannot park global permits while
    /// it waits on its own limit.
    pub async fn acquire(&self, host: &str) -> Result<ThrottlePermit, AcquireError> {
        let hperm = self.host_semaphore(host).acquire_owned().await?;
        let gperm = self.global.clone().acquire_owned().await?;
        Ok(ThrottlePermit { _global: gperm, _host: hperm })
    }

    pub fn available_global(&self) -> usize {
        self.global.available_permits()
    }

    /// Forget a host's semaphore once nothing holds or waits on it.
    ///
    /// Permits and pending acquires keep a clone of the semaphore alive, so a
    /// host still in use by another scan keeps its limit.
    pub fn release_host(&self, host: &str) {
        self.per_host.remove_if(host, |_, sem| Arc::strong_count(sem) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let throttle = Throttle::new(2, 1);
        let p1 = throttle.acquire("a.example.com").await.unwrap();
        let p2 = throttle.acquire("b.example.com").await.unwrap();
        assert_eq!(throttle.available_global(), 0);
        drop(p1);
        drop(p2);
        assert_eq!(throttle.available_global(), 2);
    }

    #[tokio::test]
    async fn test_per_host_limit_blocks_same_host() {
        let throttle = Throttle::new(4, 1);
        let _held = throttle.acquire("a.example.com").await.unwrap();
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            throttle.acquire("a.example.com"),
        )
        .await;
        assert!(second.is_err(), "second permit for the same host should wait");

        let other = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            throttle.acquire("b.example.com"),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_release_keeps_limit_while_permit_held() {
        let throttle = Throttle::new(10, 1);
        let held = throttle.acquire("h.example.com").await.unwrap();

        throttle.release_host("h.example.com");
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            throttle.acquire("h.example.com"),
        )
        .await;
        assert!(second.is_err(), "host limit must survive release while a permit is out");

        drop(held);
        throttle.release_host("h.example.com");
        assert!(throttle.per_host.is_empty());
    }
}
