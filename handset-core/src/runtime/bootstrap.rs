//! Single-flight loader for the runtime's modules.
//!
//! The first `ensure_ready` call starts loading every module in declared
//! order. Calls made while that attempt is in flight get a clone of the same
//! shared future. Success is memoized; failure resets to a state where the
//! next call starts over.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info};

use super::ModuleHost;
use crate::error::BootstrapError;

/// Marker returned once every runtime module has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready;

/// Shared handle to one bootstrap attempt.
pub type ReadyFuture = Shared<BoxFuture<'static, Result<Ready, BootstrapError>>>;

/// Observable bootstrap state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
    Idle,
    Loading,
    Ready,
    Failed(BootstrapError),
}

enum State {
    Idle,
    Loading { attempt: u64, future: ReadyFuture },
    Ready,
    Failed(BootstrapError),
}

struct Inner {
    host: Arc<dyn ModuleHost>,
    modules: Vec<String>,
    state: Mutex<State>,
    attempts: AtomicU64,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn load_all(&self, attempt: u64) -> Result<Ready, BootstrapError> {
        info!(attempt, modules = self.modules.len(), "loading runtime");
        for module in &self.modules {
            if self.host.is_loaded(module) {
                debug!(module = %module, "runtime module already present");
                continue;
            }
            debug!(module = %module, "loading runtime module");
            self.host
                .load_module(module)
                .await
                .map_err(|e| BootstrapError {
                    module: module.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(Ready)
    }

    /// Record the outcome of `attempt`, unless a newer attempt replaced it.
    fn settle(&self, attempt: u64, result: &Result<Ready, BootstrapError>) {
        let mut state = self.state();
        let current = matches!(&*state, State::Loading { attempt: a, .. } if *a == attempt);
        if !current {
            return;
        }
        *state = match result {
            Ok(_) => {
                info!(attempt, "runtime ready");
                State::Ready
            }
            Err(e) => {
                error!(attempt, error = %e, "runtime failed to load");
                State::Failed(e.clone())
            }
        };
    }
}

/// Owned single-flight bootstrap service. Clone is cheap (shares state).
#[derive(Clone)]
pub struct RuntimeBootstrap {
    inner: Arc<Inner>,
}

impl RuntimeBootstrap {
    /// Create a bootstrap that loads `modules`, in order, into `host`.
    pub fn new<I, S>(host: Arc<dyn ModuleHost>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(Inner {
                host,
                modules: modules.into_iter().map(Into::into).collect(),
                state: Mutex::new(State::Idle),
                attempts: AtomicU64::new(0),
            }),
        }
    }

    /// The host the modules are loaded into.
    pub fn host(&self) -> &Arc<dyn ModuleHost> {
        &self.inner.host
    }

    /// Declared module order.
    pub fn modules(&self) -> &[String] {
        &self.inner.modules
    }

    pub fn status(&self) -> BootstrapStatus {
        match &*self.inner.state() {
            State::Idle => BootstrapStatus::Idle,
            State::Loading { .. } => BootstrapStatus::Loading,
            State::Ready => BootstrapStatus::Ready,
            State::Failed(e) => BootstrapStatus::Failed(e.clone()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.inner.state(), State::Ready)
    }

    /// Get the future for the current bootstrap attempt, starting one if
    /// none is in flight.
    ///
    /// Concurrent callers receive clones of the same shared future
    /// (`Shared::ptr_eq` holds between them). Once ready, a resolved future
    /// is returned immediately.
    pub fn ensure_ready(&self) -> ReadyFuture {
        let mut state = self.inner.state();
        match &*state {
            State::Ready => futures::future::ready(Ok(Ready)).boxed().shared(),
            State::Loading { future, .. } => future.clone(),
            State::Idle | State::Failed(_) => {
                let attempt = self.inner.next_attempt();
                let inner = Arc::clone(&self.inner);
                let future = async move {
                    let result = inner.load_all(attempt).await;
                    inner.settle(attempt, &result);
                    result
                }
                .boxed()
                .shared();
                *state = State::Loading {
                    attempt,
                    future: future.clone(),
                };
                future
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeHost;

    const MODULES: &[&str] = &["inflate", "core", "threads"];

    fn bootstrap(host: &Arc<FakeHost>) -> RuntimeBootstrap {
        RuntimeBootstrap::new(host.clone(), MODULES.iter().copied())
    }

    #[tokio::test]
    async fn test_loads_in_declared_order() {
        let host = Arc::new(FakeHost::new());
        let boot = bootstrap(&host);

        assert_eq!(boot.status(), BootstrapStatus::Idle);
        boot.ensure_ready().await.unwrap();

        assert_eq!(host.load_log(), vec!["inflate", "core", "threads"]);
        assert_eq!(boot.status(), BootstrapStatus::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let host = Arc::new(FakeHost::new());
        let boot = bootstrap(&host);

        let futures: Vec<ReadyFuture> = (0..8).map(|_| boot.ensure_ready()).collect();
        assert_eq!(boot.status(), BootstrapStatus::Loading);
        for f in &futures[1..] {
            assert!(f.ptr_eq(&futures[0]));
        }

        let results = futures::future::join_all(futures).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(host.load_log().len(), MODULES.len());
    }

    #[tokio::test]
    async fn test_ready_is_memoized() {
        let host = Arc::new(FakeHost::new());
        let boot = bootstrap(&host);

        boot.ensure_ready().await.unwrap();
        boot.ensure_ready().await.unwrap();
        boot.clone().ensure_ready().await.unwrap();

        assert_eq!(host.load_log().len(), MODULES.len());
        assert!(boot.is_ready());
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_then_retries() {
        let host = Arc::new(FakeHost::new());
        host.fail_module_once("core");
        let boot = bootstrap(&host);

        let a = boot.ensure_ready();
        let a_handle = a.clone();
        let b = boot.ensure_ready();
        let (ra, rb) = futures::join!(a, b);

        let err = ra.unwrap_err();
        assert_eq!(err.module, "core");
        assert_eq!(rb.unwrap_err(), err);
        assert!(matches!(boot.status(), BootstrapStatus::Failed(_)));

        // Next call starts a fresh attempt; already-present modules are skipped
        let retry = boot.ensure_ready();
        assert!(!retry.ptr_eq(&a_handle));
        assert!(retry.ptr_eq(&boot.ensure_ready()));
        retry.await.unwrap();

        assert_eq!(host.load_log(), vec!["inflate", "core", "core", "threads"]);
        assert!(boot.is_ready());
    }

    #[tokio::test]
    async fn test_preloaded_modules_not_reloaded() {
        let host = Arc::new(FakeHost::new());
        host.preload("inflate");
        let boot = bootstrap(&host);

        boot.ensure_ready().await.unwrap();
        assert_eq!(host.load_log(), vec!["core", "threads"]);
    }
}
