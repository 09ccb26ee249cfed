//! Relay host lifecycle: ensure exactly one hidden execution context exists.
//!
//! The primary background context is ephemeral and cannot hold the realtime
//! connection, so a persistent relay host document owns it. `ensure()` is
//! idempotent and safe to call from every relay operation: concurrent callers
//! collapse onto one in-flight attempt, existence probes are cached briefly,
//! and creation attempts are throttled while a prior attempt settles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};

/// Runtime surface for probing and creating the relay host document.
#[async_trait]
pub trait HostRuntime: Send + Sync + 'static {
    /// Best-effort existence probe. Errors are treated as "does not exist".
    async fn exists(&self) -> Result<bool>;

    /// Creates the relay host from the given document path.
    async fn create(&self, document: &str) -> Result<()>;
}

type EnsureFuture = Shared<BoxFuture<'static, Result<()>>>;

struct EnsureState {
    inflight: Option<EnsureFuture>,
    exists_cache: Option<(bool, Instant)>,
    last_create_attempt: Option<Instant>,
}

struct ManagerInner<R> {
    runtime: Arc<R>,
    documents: Vec<String>,
    exists_cache_ttl: Duration,
    create_throttle: Duration,
    state: Mutex<EnsureState>,
    on_created: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

/// Lifecycle manager for the relay host. Cheap to clone; clones share state.
pub struct RelayHostManager<R> {
    inner: Arc<ManagerInner<R>>,
}

impl<R> Clone for RelayHostManager<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: HostRuntime> RelayHostManager<R> {
    pub fn new(runtime: Arc<R>, config: &CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                runtime,
                documents: config.relay_documents.clone(),
                exists_cache_ttl: config.exists_cache_ttl,
                create_throttle: config.create_throttle,
                state: Mutex::new(EnsureState {
                    inflight: None,
                    exists_cache: None,
                    last_create_attempt: None,
                }),
                on_created: Mutex::new(None),
            }),
        }
    }

    /// Registers a hook fired after a successful creation. A fresh host must
    /// re-announce readiness, so the proxy drops its ready gate here.
    pub fn set_on_created<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.inner.on_created.lock() = Some(Box::new(hook));
    }

    /// Marks the host as gone, invalidating the existence cache.
    pub fn mark_gone(&self) {
        self.inner.state.lock().exists_cache = Some((false, Instant::now()));
    }

    /// Ensures the relay host exists, creating it if necessary.
    ///
    /// Single-flight: every caller issued while an attempt is in flight
    /// awaits that same attempt and receives its outcome.
    pub async fn ensure(&self) -> Result<()> {
        let fut = {
            let mut state = self.inner.state.lock();
            if let Some((exists, probed_at)) = state.exists_cache {
                if exists && probed_at.elapsed() < self.inner.exists_cache_ttl {
                    return Ok(());
                }
            }
            match &state.inflight {
                Some(fut) => fut.clone(),
                None => {
                    let fut = Self::ensure_once(Arc::clone(&self.inner)).boxed().shared();
                    state.inflight = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    async fn ensure_once(inner: Arc<ManagerInner<R>>) -> Result<()> {
        let result = Self::probe_and_create(&inner).await;
        inner.state.lock().inflight = None;
        result
    }

    async fn probe_and_create(inner: &Arc<ManagerInner<R>>) -> Result<()> {
        let skip_probe = {
            let state = inner.state.lock();
            matches!(
                state.exists_cache,
                Some((false, at)) if at.elapsed() < inner.exists_cache_ttl
            )
        };

        if !skip_probe {
            // Transient probe failures count as "does not exist".
            let exists = inner.runtime.exists().await.unwrap_or(false);
            inner.state.lock().exists_cache = Some((exists, Instant::now()));
            if exists {
                return Ok(());
            }
        }

        {
            let mut state = inner.state.lock();
            if let Some(at) = state.last_create_attempt {
                if at.elapsed() < inner.create_throttle {
                    debug!(target: "tp.relay", "creation attempted recently; assuming it is settling");
                    return Ok(());
                }
            }
            state.last_create_attempt = Some(Instant::now());
        }

        let mut attempts: Vec<(String, Error)> = Vec::new();
        for document in &inner.documents {
            match inner.runtime.create(document).await {
                Ok(()) => {
                    debug!(target: "tp.relay", %document, "relay host created");
                    inner.state.lock().exists_cache = Some((true, Instant::now()));
                    if let Some(hook) = inner.on_created.lock().as_ref() {
                        hook();
                    }
                    return Ok(());
                }
                Err(err) => {
                    warn!(target: "tp.relay", %document, error = %err, "relay host creation failed; trying next candidate");
                    attempts.push((document.clone(), err));
                }
            }
        }

        let history = attempts
            .iter()
            .map(|(doc, err)| format!("{doc}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        error!(target: "tp.relay", %history, "relay host creation exhausted all candidates");
        match attempts.pop() {
            Some((_, last)) => Err(last),
            None => Err(Error::HostCreate("no candidate documents configured".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingRuntime {
        exists: AtomicBool,
        probes: AtomicU32,
        creations: AtomicU32,
        fail_documents: Vec<String>,
        create_delay: Option<Duration>,
    }

    #[async_trait]
    impl HostRuntime for CountingRuntime {
        async fn exists(&self) -> Result<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(self.exists.load(Ordering::SeqCst))
        }

        async fn create(&self, document: &str) -> Result<()> {
            if let Some(delay) = self.create_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_documents.iter().any(|d| d == document) {
                return Err(Error::HostCreate(format!("cannot load {document}")));
            }
            self.creations.fetch_add(1, Ordering::SeqCst);
            self.exists.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager(runtime: Arc<CountingRuntime>) -> RelayHostManager<CountingRuntime> {
        RelayHostManager::new(runtime, &CoordinatorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_ensures_collapse_to_one_creation() {
        let runtime = Arc::new(CountingRuntime {
            create_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let mgr = manager(Arc::clone(&runtime));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move { mgr.ensure().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(runtime.creations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_exists_cache_short_circuits_probe() {
        let runtime = Arc::new(CountingRuntime::default());
        runtime.exists.store(true, Ordering::SeqCst);
        let mgr = manager(Arc::clone(&runtime));

        mgr.ensure().await.unwrap();
        mgr.ensure().await.unwrap();
        assert_eq!(runtime.probes.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2100)).await;
        mgr.ensure().await.unwrap();
        assert_eq!(runtime.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn creation_attempts_are_throttled() {
        let runtime = Arc::new(CountingRuntime {
            fail_documents: vec!["offscreen/relay.html".into(), "relay.html".into()],
            ..Default::default()
        });
        let mgr = manager(Arc::clone(&runtime));

        assert!(mgr.ensure().await.is_err());

        // Inside the throttle window a retry is a no-op, not an error.
        tokio::time::advance(Duration::from_millis(1000)).await;
        mgr.ensure().await.unwrap();

        tokio::time::advance(Duration::from_millis(2000)).await;
        assert!(mgr.ensure().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_secondary_document() {
        let runtime = Arc::new(CountingRuntime {
            fail_documents: vec!["offscreen/relay.html".into()],
            ..Default::default()
        });
        let mgr = manager(Arc::clone(&runtime));

        mgr.ensure().await.unwrap();
        assert_eq!(runtime.creations.load(Ordering::SeqCst), 1);
        assert!(runtime.exists.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn creation_fires_on_created_hook() {
        let runtime = Arc::new(CountingRuntime::default());
        let mgr = manager(Arc::clone(&runtime));
        let fired = Arc::new(AtomicBool::new(false));
        let observed = Arc::clone(&fired);
        mgr.set_on_created(move || observed.store(true, Ordering::SeqCst));

        mgr.ensure().await.unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_gone_skips_stale_probe_and_recreates() {
        let runtime = Arc::new(CountingRuntime::default());
        let mgr = manager(Arc::clone(&runtime));

        mgr.ensure().await.unwrap();
        assert_eq!(runtime.creations.load(Ordering::SeqCst), 1);

        runtime.exists.store(false, Ordering::SeqCst);
        mgr.mark_gone();
        tokio::time::advance(Duration::from_millis(2100)).await;
        mgr.ensure().await.unwrap();
        assert_eq!(runtime.creations.load(Ordering::SeqCst), 2);
    }
}
