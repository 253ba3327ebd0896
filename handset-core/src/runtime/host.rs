//! Module host backed by a directory of runtime script resources.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{ModuleHost, Runtime};

/// Loads runtime modules from `<root>/<module>` into memory.
///
/// The host only stages resources; an embedder that can execute them
/// installs the resulting [`Runtime`] with [`ScriptDirHost::install_runtime`].
/// Until then `runtime()` is None and boots report the runtime as missing.
pub struct ScriptDirHost {
    root: PathBuf,
    loaded: RwLock<HashMap<String, Vec<u8>>>,
    runtime: RwLock<Option<Arc<dyn Runtime>>>,
}

impl ScriptDirHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: RwLock::new(HashMap::new()),
            runtime: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source of a loaded module.
    pub fn module_source(&self, module: &str) -> Option<Vec<u8>> {
        self.loaded.read().ok()?.get(module).cloned()
    }

    /// Number of modules staged so far.
    pub fn loaded_count(&self) -> usize {
        self.loaded.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn install_runtime(&self, runtime: Arc<dyn Runtime>) {
        if let Ok(mut slot) = self.runtime.write() {
            *slot = Some(runtime);
        }
    }
}

#[async_trait]
impl ModuleHost for ScriptDirHost {
    fn is_loaded(&self, module: &str) -> bool {
        self.loaded
            .read()
            .map(|l| l.contains_key(module))
            .unwrap_or(false)
    }

    async fn load_module(&self, module: &str) -> io::Result<()> {
        let path = self.root.join(module);
        let source = tokio::fs::read(&path).await.map_err(|e| {
            io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
        })?;
        debug!(module, bytes = source.len(), "staged runtime module");
        self.loaded
            .write()
            .map_err(|_| io::Error::other("module table lock poisoned"))?
            .insert(module.to_string(), source);
        Ok(())
    }

    fn runtime(&self) -> Option<Arc<dyn Runtime>> {
        self.runtime.read().ok()?.clone()
    }
}
