//! Per-game session against the shared bytecode runtime.
//!
//! ```text
//! NotBooted --boot--> Booting --(ready + archive loaded)--> Booted
//!     ^                  |                                     |
//!     +---- failure -----+                                teardown
//!                                                              v
//!                                          TornDown (rebootable like NotBooted)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::GameDescriptor;
use crate::error::{HandsetError, HandsetResult};
use crate::input::Key;
use crate::runtime::{Runtime, RuntimeBootstrap};

/// Default delay between a key press and its release.
pub const DEFAULT_KEY_RELEASE: Duration = Duration::from_millis(100);

/// Boot state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    NotBooted,
    Booting,
    Booted,
    TornDown,
}

/// Runtime storage namespace for a game, so each game keeps its own saves.
pub fn storage_namespace(game_name: &str) -> String {
    format!("midlet_{}", game_name)
}

struct SessionInner {
    state: BootState,
    /// Bumped by every teardown; a boot that straddles one is discarded.
    generation: u64,
    runtime: Option<Arc<dyn Runtime>>,
    pending_releases: Vec<JoinHandle<()>>,
}

/// One runtime-hosted game.
pub struct EmulatorSession {
    descriptor_id: String,
    namespace: String,
    bootstrap: RuntimeBootstrap,
    key_release: Duration,
    inner: Mutex<SessionInner>,
}

impl EmulatorSession {
    pub fn new(descriptor: &GameDescriptor, bootstrap: RuntimeBootstrap) -> Self {
        Self {
            descriptor_id: descriptor.id.clone(),
            namespace: storage_namespace(&descriptor.name),
            bootstrap,
            key_release: DEFAULT_KEY_RELEASE,
            inner: Mutex::new(SessionInner {
                state: BootState::NotBooted,
                generation: 0,
                runtime: None,
                pending_releases: Vec::new(),
            }),
        }
    }

    pub fn with_key_release(mut self, delay: Duration) -> Self {
        self.key_release = delay;
        self
    }

    pub fn descriptor_id(&self) -> &str {
        &self.descriptor_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> BootState {
        self.lock().state
    }

    pub fn is_booted(&self) -> bool {
        self.state() == BootState::Booted
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Boot the game's archive in the runtime.
    ///
    /// No-op if already booted or booting, or if the descriptor has no
    /// payload. On failure the session returns to `NotBooted`.
    pub async fn boot(&self, descriptor: &GameDescriptor) -> HandsetResult<()> {
        let Some(payload) = descriptor.payload() else {
            debug!(id = %descriptor.id, "boot skipped, no payload");
            return Ok(());
        };

        let generation = {
            let mut inner = self.lock();
            match inner.state {
                BootState::Booted | BootState::Booting => {
                    debug!(id = %self.descriptor_id, state = ?inner.state, "boot ignored");
                    return Ok(());
                }
                BootState::NotBooted | BootState::TornDown => {}
            }
            inner.state = BootState::Booting;
            inner.generation
        };

        info!(id = %self.descriptor_id, bytes = payload.len(), "booting");
        match self.load(payload).await {
            Ok(runtime) => {
                let mut inner = self.lock();
                if inner.generation != generation {
                    warn!(id = %self.descriptor_id, "torn down while booting, discarding boot");
                    drop(inner);
                    runtime.stop();
                    return Ok(());
                }
                inner.state = BootState::Booted;
                inner.runtime = Some(runtime);
                info!(id = %self.descriptor_id, "booted");
                Ok(())
            }
            Err(e) => {
                let mut inner = self.lock();
                if inner.generation == generation {
                    inner.state = BootState::NotBooted;
                }
                warn!(id = %self.descriptor_id, error = %e, "boot failed");
                Err(e)
            }
        }
    }

    async fn load(&self, payload: &[u8]) -> HandsetResult<Arc<dyn Runtime>> {
        self.bootstrap.ensure_ready().await?;
        let runtime = self
            .bootstrap
            .host()
            .runtime()
            .ok_or(HandsetError::RuntimeUnavailable)?;
        runtime.set_storage_namespace(&self.namespace);
        runtime
            .load_archive(payload)
            .await
            .map_err(|e| HandsetError::Boot(e.to_string()))?;
        Ok(runtime)
    }

    /// Stop the runtime and cancel pending key releases. The session can be
    /// booted again afterwards.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        for handle in inner.pending_releases.drain(..) {
            handle.abort();
        }
        let runtime = inner.runtime.take().or_else(|| self.bootstrap.host().runtime());
        if let Some(runtime) = runtime {
            runtime.stop();
        }
        inner.generation += 1;
        inner.state = BootState::TornDown;
        info!(id = %self.descriptor_id, "torn down");
    }

    /// Tap a key: press now, release after a short delay.
    ///
    /// Returns false (and does nothing) unless the session is booted.
    /// Must be called from within a tokio runtime.
    pub fn send_key(&self, key: &Key) -> bool {
        let mut inner = self.lock();
        let runtime = match (&inner.state, &inner.runtime) {
            (BootState::Booted, Some(runtime)) => Arc::clone(runtime),
            _ => return false,
        };

        let name = key.runtime_name();
        runtime.send_key_press(&name);

        let delay = self.key_release;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            runtime.send_key_release(&name);
        });
        inner.pending_releases.retain(|h| !h.is_finished());
        inner.pending_releases.push(handle);
        true
    }
}

impl Drop for EmulatorSession {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in inner.pending_releases.drain(..) {
            handle.abort();
        }
    }
}
