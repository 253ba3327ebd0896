//! Boundary to the third-party bytecode runtime that hosts imported games.
//!
//! The runtime is a black box. The host loads its script modules in order
//! (see [`RuntimeBootstrap`]) and afterwards may expose a [`Runtime`] handle.

mod bootstrap;
mod host;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;

pub use bootstrap::{BootstrapStatus, Ready, ReadyFuture, RuntimeBootstrap};
pub use host::ScriptDirHost;

/// A loaded runtime instance.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Hand a whole game archive to the runtime and start it.
    async fn load_archive(&self, archive: &[u8]) -> io::Result<()>;

    /// Stop whatever game is running.
    fn stop(&self);

    fn send_key_press(&self, key: &str);

    fn send_key_release(&self, key: &str);

    /// Namespace under which the runtime persists a game's save data.
    fn set_storage_namespace(&self, namespace: &str);
}

/// Environment that loads runtime modules and exposes the runtime.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// Whether a module is already present in the host.
    fn is_loaded(&self, module: &str) -> bool;

    /// Load one module. Called only for modules not yet loaded.
    async fn load_module(&self, module: &str) -> io::Result<()>;

    /// The runtime, once its modules are loaded. None if the host has none.
    fn runtime(&self) -> Option<Arc<dyn Runtime>>;
}
