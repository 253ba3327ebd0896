//! Directory-backed store: one file per key.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::kv_store::{file_name_key, key_file_name, KvStore};
use crate::error::HandsetResult;

const DOCUMENT_EXT: &str = "json";

/// Persistent store rooted at a directory.
///
/// Each key maps to `<root>/<key_file_name(key)>.json`, and [`KvStore::keys`]
/// decodes the file names back to the original keys. Writes go to a
/// temporary sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> HandsetResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the documents.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", key_file_name(key), DOCUMENT_EXT))
    }
}

impl KvStore for DirStore {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "failed to read stored document");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> HandsetResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> bool {
        fs::remove_file(self.path_for(key)).is_ok()
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXT) {
                    return None;
                }
                let stem = path.file_stem().and_then(|s| s.to_str())?;
                let key = file_name_key(stem);
                if key.is_none() {
                    warn!(file = stem, "skipping document with unrecognised name");
                }
                key
            })
            .collect();
        keys.sort();
        keys
    }
}
