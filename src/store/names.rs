//! Code-to-name cache with one outstanding lookup per code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::api::Gateway;
use crate::error::StoreResult;

use super::failures::{Entity, FailureLog};

type Lookup = Shared<BoxFuture<'static, StoreResult<String>>>;

struct Inner {
    gateway: Arc<dyn Gateway>,
    failures: Arc<FailureLog>,
    cache: RwLock<HashMap<String, String>>,
    in_flight: Mutex<HashMap<String, Lookup>>,
    /// Bumped on every clear; lookups started under an older generation do
    /// not write back
    generation: AtomicU64,
}

enum Resolution {
    Cached(String),
    Pending(Lookup),
}

/// Resolves instrument codes to display names.
///
/// Concurrent callers for the same uncached code attach to a single shared
/// request instead of issuing their own. Each request is driven by its own
/// task, so it settles and fills the cache even if every caller stops
/// waiting.
#[derive(Clone)]
pub(crate) struct NameResolver {
    inner: Arc<Inner>,
}

impl NameResolver {
    pub fn new(gateway: Arc<dyn Gateway>, failures: Arc<FailureLog>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                failures,
                cache: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub async fn cached(&self, code: &str) -> Option<String> {
        self.inner.cache.read().await.get(code).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.cache.read().await.clone()
    }

    pub async fn resolve(&self, code: &str) -> StoreResult<String> {
        match self.begin(code).await {
            Resolution::Cached(name) => Ok(name),
            Resolution::Pending(lookup) => lookup.await,
        }
    }

    /// Start resolving `code` without waiting for the answer.
    pub async fn prefetch(&self, code: &str) {
        self.begin(code).await;
    }

    async fn begin(&self, code: &str) -> Resolution {
        if let Some(name) = self.cached(code).await {
            debug!(code = %code, "Name cache hit");
            return Resolution::Cached(name);
        }

        let mut in_flight = self.inner.in_flight.lock().await;

        // A lookup may have finished between the cache check and taking the lock.
        if let Some(name) = self.cached(code).await {
            return Resolution::Cached(name);
        }

        if let Some(existing) = in_flight.get(code) {
            debug!(code = %code, "Joining in-flight name lookup");
            return Resolution::Pending(existing.clone());
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        let lookup = Self::lookup(self.inner.clone(), code.to_string(), generation)
            .boxed()
            .shared();
        in_flight.insert(code.to_string(), lookup.clone());

        match Handle::try_current() {
            Ok(runtime) => {
                let driver = lookup.clone();
                runtime.spawn(async move {
                    let _ = driver.await;
                });
            }
            // Outside a tokio runtime the lookup runs when first awaited.
            Err(_) => debug!(code = %code, "No runtime, name lookup deferred"),
        }

        Resolution::Pending(lookup)
    }

    async fn lookup(inner: Arc<Inner>, code: String, generation: u64) -> StoreResult<String> {
        let result = inner.gateway.fetch_name(&code).await;

        let current = {
            let mut cache = inner.cache.write().await;
            let current = inner.generation.load(Ordering::SeqCst) == generation;
            if let (true, Ok(name)) = (current, &result) {
                cache.insert(code.clone(), name.clone());
            }
            current
        };
        if !current {
            debug!(code = %code, "Discarding name resolved before cache clear");
            return result;
        }

        if let Err(e) = &result {
            inner.failures.record(Entity::Name, e.clone()).await;
        }
        inner.in_flight.lock().await.remove(&code);
        result
    }

    /// Drop every cached name and detach outstanding lookups.
    pub async fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.in_flight.lock().await.clear();
        self.inner.cache.write().await.clear();
    }

    #[cfg(test)]
    pub async fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }
}
