//! Lazily created, process-wide resource handles.
//!
//! A [`LazyResource`] owns at most one live handle (a database pool, a storage
//! container client). The first caller of [`LazyResource::acquire`] runs the
//! factory; callers arriving while that attempt is in flight await the very
//! same attempt. A failed attempt is reported to all of its waiters and the
//! slot goes back to `Unset`, so the next call starts a fresh attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{info, warn};

/// Builds the handle guarded by a [`LazyResource`].
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Handle: Clone + Send + Sync + 'static;

    /// Short name used in logs and errors, e.g. `database`.
    fn name(&self) -> &str;

    async fn create(&self) -> anyhow::Result<Self::Handle>;
}

/// Failure of one initialization attempt, shared by every caller that waited on it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InitError {
    resource: String,
    message: String,
}

impl InitError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self { resource: resource.into(), message: message.into() }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Unset,
    Initializing,
    Ready,
}

type Attempt<T> = Shared<BoxFuture<'static, Result<T, InitError>>>;

enum Slot<T> {
    Unset,
    Initializing { generation: u64, attempt: Attempt<T> },
    Ready(T),
}

pub struct LazyResource<F: ResourceFactory> {
    factory: Arc<F>,
    slot: Arc<Mutex<Slot<F::Handle>>>,
    attempts: Arc<AtomicU64>,
}

impl<F: ResourceFactory> Clone for LazyResource<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            slot: Arc::clone(&self.slot),
            attempts: Arc::clone(&self.attempts),
        }
    }
}

fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<F: ResourceFactory> LazyResource<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
            slot: Arc::new(Mutex::new(Slot::Unset)),
            attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the live handle, creating it if needed.
    ///
    /// Never retries on its own: a failure is returned as is, and it is the
    /// next call that starts another attempt.
    pub async fn acquire(&self) -> Result<F::Handle, InitError> {
        let attempt = {
            let mut slot = lock(&self.slot);
            match &*slot {
                Slot::Ready(handle) => return Ok(handle.clone()),
                Slot::Initializing { attempt, .. } => attempt.clone(),
                Slot::Unset => {
                    let (generation, attempt) = self.start_attempt();
                    *slot = Slot::Initializing { generation, attempt: attempt.clone() };
                    attempt
                }
            }
        };
        attempt.await
    }

    pub fn state(&self) -> ResourceState {
        match &*lock(&self.slot) {
            Slot::Unset => ResourceState::Unset,
            Slot::Initializing { .. } => ResourceState::Initializing,
            Slot::Ready(_) => ResourceState::Ready,
        }
    }

    /// Number of initialization attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    // Must be called with the slot lock held, the caller installs the returned attempt.
    fn start_attempt(&self) -> (u64, Attempt<F::Handle>) {
        let generation = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let factory = Arc::clone(&self.factory);
        let slot = Arc::clone(&self.slot);

        let attempt = async move {
            let name = factory.name().to_string();
            info!(resource = %name, event = "resource_init_start", attempt = generation, "initializing shared resource");

            let outcome = factory
                .create()
                .await
                .map_err(|e| InitError::new(name.clone(), format!("{e:#}")));

            {
                let mut guard = lock(&slot);
                let current = matches!(&*guard, Slot::Initializing { generation: g, .. } if *g == generation);
                if current {
                    *guard = match &outcome {
                        Ok(handle) => Slot::Ready(handle.clone()),
                        Err(_) => Slot::Unset,
                    };
                }
            }

            match &outcome {
                Ok(_) => info!(resource = %name, event = "resource_init_ready", attempt = generation, "shared resource ready"),
                Err(e) => warn!(resource = %name, event = "resource_init_failed", attempt = generation, error = %e, "shared resource initialization failed"),
            }
            outcome
        }
        .boxed()
        .shared();

        (generation, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingFactory {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
        delay: Duration,
    }

    impl CountingFactory {
        fn new(fail_first: usize, delay_ms: u64) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let factory = Self { calls: Arc::clone(&calls), fail_first, delay: Duration::from_millis(delay_ms) };
            (factory, calls)
        }
    }

    #[async_trait]
    impl ResourceFactory for CountingFactory {
        type Handle = usize;

        fn name(&self) -> &str {
            "counter"
        }

        async fn create(&self) -> anyhow::Result<usize> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if n <= self.fail_first {
                anyhow::bail!("backing store unreachable (call {n})");
            }
            Ok(n)
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_attempt() {
        let (factory, calls) = CountingFactory::new(0, 50);
        let resource = LazyResource::new(factory);

        let waiters = (0..16).map(|_| {
            let r = resource.clone();
            async move { r.acquire().await }
        });
        let results = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| matches!(r, Ok(1))));
        assert_eq!(resource.state(), ResourceState::Ready);
        assert_eq!(resource.attempts(), 1);
    }

    #[tokio::test]
    async fn ready_handle_is_cached() {
        let (factory, calls) = CountingFactory::new(0, 0);
        let resource = LazyResource::new(factory);

        assert_eq!(resource.state(), ResourceState::Unset);
        assert_eq!(resource.acquire().await.unwrap(), 1);
        assert_eq!(resource.acquire().await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_resets_slot_and_next_call_retries() {
        let (factory, calls) = CountingFactory::new(1, 0);
        let resource = LazyResource::new(factory);

        let err = resource.acquire().await.unwrap_err();
        assert!(err.message().contains("unreachable"));
        assert_eq!(err.resource(), "counter");
        assert_eq!(resource.state(), ResourceState::Unset);

        assert_eq!(resource.acquire().await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resource.state(), ResourceState::Ready);
    }

    #[tokio::test]
    async fn all_waiters_of_a_failed_attempt_see_its_error() {
        let (factory, calls) = CountingFactory::new(1, 50);
        let resource = LazyResource::new(factory);

        let waiters = (0..8).map(|_| {
            let r = resource.clone();
            async move { r.acquire().await }
        });
        let results = futures::future::join_all(waiters).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(resource.state(), ResourceState::Unset);
    }

    #[tokio::test]
    async fn state_reports_initializing_while_in_flight() {
        let (factory, _calls) = CountingFactory::new(0, 100);
        let resource = LazyResource::new(factory);

        let background = {
            let r = resource.clone();
            tokio::spawn(async move { r.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(resource.state(), ResourceState::Initializing);

        assert_eq!(background.await.unwrap().unwrap(), 1);
        assert_eq!(resource.state(), ResourceState::Ready);
    }
}
