//! Bounded pool of reusable resources such as browser instances.
//!
//! A semaphore caps how many resources exist at once. Released resources go
//! back to an idle queue and are reused by the next [`ResourcePool::acquire`];
//! idle resources older than the idle timeout are dropped instead.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::Error;

struct Idle<T> {
    resource: T,
    since: Instant,
}

struct PoolInner<T> {
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Idle<T>>>,
    capacity: usize,
    idle_timeout: Duration,
}

impl<T> PoolInner<T> {
    fn idle(&self) -> std::sync::MutexGuard<'_, Vec<Idle<T>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the most recently released live resource, dropping stale ones.
    fn take_idle(&self) -> Option<T> {
        let stale: Vec<Idle<T>> = {
            let mut idle = self.idle();
            let (fresh, stale): (Vec<_>, Vec<_>) = idle.drain(..).partition(|i| i.since.elapsed() < self.idle_timeout);
            *idle = fresh;
            stale
        };
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "dropping idle pooled resources");
        }
        drop(stale);
        self.idle().pop().map(|i| i.resource)
    }
}

/// Pool handing out at most `capacity` resources at a time.
pub struct ResourcePool<T> {
    inner: Arc<PoolInner<T>>,
}

impl<T> Clone for ResourcePool<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.inner.semaphore.available_permits())
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl<T> ResourcePool<T> {
    /// Create a pool. A zero capacity is raised to one.
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                idle: Mutex::new(Vec::new()),
                capacity,
                idle_timeout,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Wait for a slot, then reuse an idle resource or build one with `create`.
    ///
    /// # Errors
    ///
    /// Returns `Error::PoolClosed` after [`ResourcePool::close`], or whatever
    /// `create` fails with. A failed `create` frees its slot.
    pub async fn acquire<F, Fut>(&self, create: F) -> Result<Lease<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::PoolClosed)?;

        let resource = match self.inner.take_idle() {
            Some(resource) => resource,
            None => create().await?,
        };

        Ok(Lease { resource: Some(resource), pool: Arc::clone(&self.inner), _permit: permit })
    }

    /// Stop handing out resources and drop every idle one.
    pub fn close(&self) {
        self.inner.semaphore.close();
        self.inner.idle().clear();
    }
}

/// Exclusive use of a pooled resource. Returned to the pool on drop.
pub struct Lease<T> {
    resource: Option<T>,
    pool: Arc<PoolInner<T>>,
    _permit: OwnedSemaphorePermit,
}

impl<T> Lease<T> {
    /// Drop the resource instead of returning it, e.g. after it failed.
    pub fn discard(mut self) {
        self.resource = None;
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.resource {
            Some(resource) => resource,
            None => unreachable!("lease resource is only taken on discard or drop"),
        }
    }
}

impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.resource {
            Some(resource) => resource,
            None => unreachable!("lease resource is only taken on discard or drop"),
        }
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        if self.pool.semaphore.is_closed() {
            return;
        }
        self.pool.idle().push(Idle { resource, since: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_create(counter: Arc<AtomicUsize>) -> impl Future<Output = Result<usize, Error>> {
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) }
    }

    #[tokio::test]
    async fn test_released_resource_is_reused() {
        let pool = ResourcePool::new(2, Duration::from_secs(60));
        let created = Arc::new(AtomicUsize::new(0));

        let lease = pool.acquire(|| counting_create(created.clone())).await.unwrap();
        assert_eq!(*lease, 0);
        drop(lease);
        assert_eq!(pool.idle_count(), 1);

        let lease = pool.acquire(|| counting_create(created.clone())).await.unwrap();
        assert_eq!(*lease, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capacity_blocks_extra_acquire() {
        let pool = ResourcePool::new(1, Duration::from_secs(60));
        let created = Arc::new(AtomicUsize::new(0));

        let _held = pool.acquire(|| counting_create(created.clone())).await.unwrap();
        let second = tokio::time::timeout(Duration::from_millis(20), pool.acquire(|| counting_create(created.clone()))).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_idle_timeout_drops_stale_resource() {
        let pool = ResourcePool::new(1, Duration::from_millis(10));
        let created = Arc::new(AtomicUsize::new(0));

        drop(pool.acquire(|| counting_create(created.clone())).await.unwrap());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let lease = pool.acquire(|| counting_create(created.clone())).await.unwrap();
        assert_eq!(*lease, 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_discard_is_not_reused() {
        let pool = ResourcePool::new(1, Duration::from_secs(60));
        let created = Arc::new(AtomicUsize::new(0));

        pool.acquire(|| counting_create(created.clone())).await.unwrap().discard();
        assert_eq!(pool.idle_count(), 0);

        let lease = pool.acquire(|| counting_create(created.clone())).await.unwrap();
        assert_eq!(*lease, 1);
    }

    #[tokio::test]
    async fn test_failed_create_frees_slot() {
        let pool: ResourcePool<usize> = ResourcePool::new(1, Duration::from_secs(60));
        let failed = pool.acquire(|| async { Err(Error::ScreenshotFailed("launch".into())) }).await;
        assert!(failed.is_err());

        let lease = pool.acquire(|| async { Ok(7) }).await.unwrap();
        assert_eq!(*lease, 7);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let pool: ResourcePool<usize> = ResourcePool::new(1, Duration::from_secs(60));
        pool.close();
        let result = pool.acquire(|| async { Ok(1) }).await;
        assert!(matches!(result, Err(Error::PoolClosed)));
    }

    #[tokio::test]
    async fn test_lease_deref_mut() {
        let pool = ResourcePool::new(1, Duration::from_secs(60));
        {
            let mut lease = pool.acquire(|| async { Ok(vec![1]) }).await.unwrap();
            lease.push(2);
        }
        let lease = pool.acquire(|| async { Ok(Vec::new()) }).await.unwrap();
        assert_eq!(*lease, vec![1, 2]);
    }
}
