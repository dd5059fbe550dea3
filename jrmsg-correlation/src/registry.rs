//! Pending request tracking
//!
//! The registry correlates outgoing requests with their eventual responses
//! by numeric id.
//!
//! # Entry Lifecycle
//!
//! 1. **Register**: store a callback for the id and arm a timer
//! 2. **Fire**: a Response naming the id arrives; the timer is cancelled and
//!    the callback runs with `Ok(response)`
//! 3. **Expire**: the timer elapses first; the callback runs with
//!    `Err(Error::Timeout)`
//! 4. **Remove**: the caller gives up; the timer is cancelled and the
//!    callback is dropped without running
//!
//! Exactly one of fire, expire or remove settles an entry. The map lock is
//! the critical section: whichever path takes the entry out of the map owns
//! it, and callbacks always run after the lock is released.
//!
//! Registering an id that is already pending replaces the older entry. The
//! older callback is dropped without being invoked.

use crate::metrics::CorrelationMetrics;
use crate::options::DEFAULT_CALLBACK_TIMEOUT;
use crate::pending::PendingResponse;
use jrmsg_core::{Error, IdCounter, Response, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Callback invoked once with the outcome of a request
pub type Callback = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

struct Entry {
    /// Distinguishes this registration from earlier ones under the same id
    token: u64,
    callback: Callback,
    timer: AbortHandle,
    registered_at: Instant,
}

struct Inner {
    pending: Mutex<HashMap<u64, Entry>>,
    tokens: AtomicU64,
    ids: Arc<IdCounter>,
    default_timeout: RwLock<Duration>,
    metrics: RwLock<Option<Arc<CorrelationMetrics>>>,
}

/// Correlates responses with pending requests
///
/// Cheap to clone; clones share the same pending map. Each registry is an
/// independent correlation domain (for example one per connection).
#[derive(Clone)]
pub struct CorrelationRegistry {
    inner: Arc<Inner>,
}

impl CorrelationRegistry {
    /// Create a registry with its own id counter
    pub fn new() -> Self {
        Self::with_ids(Arc::new(IdCounter::new()))
    }

    /// Create a registry issuing ids from a shared counter
    pub fn with_ids(ids: Arc<IdCounter>) -> Self {
        Self::build(ids, DEFAULT_CALLBACK_TIMEOUT, None)
    }

    pub(crate) fn build(
        ids: Arc<IdCounter>,
        default_timeout: Duration,
        metrics: Option<Arc<CorrelationMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pending: Mutex::new(HashMap::new()),
                tokens: AtomicU64::new(0),
                ids,
                default_timeout: RwLock::new(default_timeout),
                metrics: RwLock::new(metrics),
            }),
        }
    }

    /// Use a different window for [`register`](Self::register) and
    /// [`track_default`](Self::track_default)
    pub fn with_default_timeout(self, timeout: Duration) -> Self {
        self.set_default_timeout(timeout);
        self
    }

    /// Change the default window for this registry and all its clones
    ///
    /// Entries already registered keep the window they were armed with.
    pub fn set_default_timeout(&self, timeout: Duration) {
        *self.inner.default_timeout.write() = timeout;
    }

    /// Record lifecycle metrics
    pub fn with_metrics(self, metrics: Arc<CorrelationMetrics>) -> Self {
        self.set_metrics(metrics);
        self
    }

    /// Start recording lifecycle metrics on this registry and all its clones
    pub fn set_metrics(&self, metrics: Arc<CorrelationMetrics>) {
        *self.inner.metrics.write() = Some(metrics);
    }

    /// Issue the next request id
    pub fn next_id(&self) -> u64 {
        self.inner.ids.next_id()
    }

    /// Counter this registry issues ids from
    pub fn ids(&self) -> &Arc<IdCounter> {
        &self.inner.ids
    }

    /// Window used when no timeout is given
    pub fn default_timeout(&self) -> Duration {
        *self.inner.default_timeout.read()
    }

    /// Register a callback with the default timeout
    pub fn register<F>(&self, id: u64, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        self.register_with_timeout(id, callback, self.default_timeout())
    }

    /// Register a callback that expires after `timeout`
    ///
    /// # Errors
    ///
    /// - `TypeConstraint` when `id` is zero
    /// - `NoRuntime` when called outside a tokio runtime
    pub fn register_with_timeout<F>(&self, id: u64, callback: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        if id == 0 {
            return Err(Error::TypeConstraint(
                "request id must be a positive integer".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let token = self.inner.tokens.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.inner);

        // The timer is spawned and the entry inserted under one lock, so the
        // timer can never look for the entry before it exists.
        let previous = {
            let mut pending = self.inner.pending.lock();
            let timer = runtime
                .spawn(expire_after(weak, id, token, timeout))
                .abort_handle();
            pending.insert(
                id,
                Entry {
                    token,
                    callback: Box::new(callback),
                    timer,
                    registered_at: Instant::now(),
                },
            )
        };

        let replaced = previous.is_some();
        if let Some(previous) = previous {
            previous.timer.abort();
        }
        if let Some(metrics) = self.inner.metrics() {
            metrics.record_registered(replaced);
        }
        tracing::debug!(id, ?timeout, replaced, "Registered pending request");

        Ok(())
    }

    /// Wait for the response to `id` as a future, with the default timeout
    pub fn track_default(&self, id: u64) -> Result<PendingResponse> {
        self.track(id, self.default_timeout())
    }

    /// Wait for the response to `id` as a future
    ///
    /// The future resolves with the response on [`fire`](Self::fire), fails
    /// with `Error::Timeout` on expiry, and with `Error::Cancelled` if the
    /// entry is removed or replaced first.
    pub fn track(&self, id: u64, timeout: Duration) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        self.register_with_timeout(
            id,
            move |outcome| {
                // The caller may have stopped waiting
                let _ = tx.send(outcome);
            },
            timeout,
        )?;
        Ok(PendingResponse::new(id, rx))
    }

    /// Deliver a response to whoever is waiting on its id
    ///
    /// Returns `true` when a pending entry was settled. A response without
    /// an id, or with an id nobody is waiting for, is ignored.
    pub fn fire(&self, response: &Response) -> bool {
        let Some(id) = response.id() else {
            tracing::trace!("Ignoring response without id");
            return false;
        };

        let entry = self.inner.pending.lock().remove(&id);
        let Some(entry) = entry else {
            tracing::trace!(id, "No pending request for response");
            if let Some(metrics) = self.inner.metrics() {
                metrics.record_unmatched();
            }
            return false;
        };

        entry.timer.abort();
        if let Some(metrics) = self.inner.metrics() {
            metrics.record_delivered(entry.registered_at.elapsed());
        }
        tracing::debug!(id, success = response.is_success(), "Delivering response");

        (entry.callback)(Ok(response.clone()));
        true
    }

    /// Forget a pending request without invoking its callback
    ///
    /// Idempotent. Returns `true` if an entry was removed.
    pub fn remove(&self, id: u64) -> bool {
        let entry = self.inner.pending.lock().remove(&id);
        match entry {
            Some(entry) => {
                entry.timer.abort();
                if let Some(metrics) = self.inner.metrics() {
                    metrics.record_removed();
                }
                tracing::debug!(id, "Removed pending request");
                true
            }
            None => false,
        }
    }

    /// Whether a request with this id is still waiting
    pub fn is_pending(&self, id: u64) -> bool {
        self.inner.pending.lock().contains_key(&id)
    }

    /// Number of requests still waiting
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl Inner {
    fn metrics(&self) -> Option<Arc<CorrelationMetrics>> {
        self.metrics.read().clone()
    }

    fn expire(&self, id: u64, token: u64, after: Duration) {
        let entry = {
            let mut pending = self.pending.lock();
            match pending.get(&id) {
                Some(entry) if entry.token == token => pending.remove(&id),
                _ => None,
            }
        };

        if let Some(entry) = entry {
            if let Some(metrics) = self.metrics() {
                metrics.record_timed_out(entry.registered_at.elapsed());
            }
            tracing::warn!(id, ?after, "Request timed out");
            (entry.callback)(Err(Error::Timeout { id, after }));
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (_, entry) in self.pending.get_mut().drain() {
            entry.timer.abort();
        }
    }
}

async fn expire_after(inner: Weak<Inner>, id: u64, token: u64, after: Duration) {
    tokio::time::sleep(after).await;
    if let Some(inner) = inner.upgrade() {
        inner.expire(id, token, after);
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CorrelationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRegistry")
            .field("pending", &self.pending_count())
            .field("default_timeout", &self.default_timeout())
            .field("last_id", &self.inner.ids.last_issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(hits: &Arc<AtomicUsize>) -> impl FnOnce(Result<Response>) + Send + 'static {
        let hits = hits.clone();
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_next_id() {
        let registry = CorrelationRegistry::new();

        let id1 = registry.next_id();
        let id2 = registry.next_id();

        assert_eq!(id1, 1);
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn test_register_and_fire() {
        let registry = CorrelationRegistry::new();
        let (tx, rx) = oneshot::channel();

        registry
            .register(1, move |outcome| {
                tx.send(outcome).unwrap();
            })
            .unwrap();
        assert_eq!(registry.pending_count(), 1);
        assert!(registry.is_pending(1));

        assert!(registry.fire(&Response::success(1, json!(42))));
        assert_eq!(registry.pending_count(), 0);

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.result(), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_fire_unmatched_is_noop() {
        let registry = CorrelationRegistry::new();

        assert!(!registry.fire(&Response::success(3, json!(null))));

        let mut anonymous = Response::new();
        anonymous.set_result(json!("x"));
        assert!(!registry.fire(&anonymous));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = CorrelationRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.register(4, counting_callback(&hits)).unwrap();
        assert!(registry.remove(4));
        assert!(!registry.remove(4));
        assert!(!registry.remove(99));

        assert!(!registry.fire(&Response::success(4, json!(1))));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_id_rejected() {
        let registry = CorrelationRegistry::new();
        let result = registry.register(0, |_| {});
        assert!(matches!(result, Err(Error::TypeConstraint(_))));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_register_outside_runtime() {
        let registry = CorrelationRegistry::new();
        assert_eq!(registry.register(1, |_| {}), Err(Error::NoRuntime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_delivers_error() {
        let registry = CorrelationRegistry::new();
        let pending = registry.track(7, Duration::from_millis(1)).unwrap();

        let outcome = pending.await;
        assert_eq!(
            outcome,
            Err(Error::Timeout {
                id: 7,
                after: Duration::from_millis(1)
            })
        );
        assert!(!registry.is_pending(7));
    }

    #[tokio::test]
    async fn test_builder_options() {
        let registry = CorrelationRegistry::new()
            .with_default_timeout(Duration::from_millis(500))
            .with_metrics(Arc::new(CorrelationMetrics::new()));
        assert_eq!(registry.default_timeout(), Duration::from_millis(500));

        let ids = Arc::new(IdCounter::new());
        let shared = CorrelationRegistry::with_ids(ids.clone());
        shared.next_id();
        assert_eq!(ids.last_issued(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_apply_after_clone() {
        let registry = CorrelationRegistry::new();
        let clone = registry.clone();

        let registry = registry
            .with_default_timeout(Duration::from_millis(20))
            .with_metrics(Arc::new(CorrelationMetrics::new()));
        assert_eq!(registry.default_timeout(), Duration::from_millis(20));
        assert_eq!(clone.default_timeout(), Duration::from_millis(20));

        let pending = clone.track_default(6).unwrap();
        assert_eq!(
            pending.await,
            Err(Error::Timeout {
                id: 6,
                after: Duration::from_millis(20)
            })
        );
    }
}
