//! KvStore trait - document storage shared by the catalog and engines.

use crate::error::HandsetResult;

/// Document store keyed by short strings.
///
/// Methods take `&self` so one store can be shared (behind an `Arc`) by the
/// catalog and every running engine. Last write wins.
pub trait KvStore: Send + Sync {
    /// Read a document. Returns None if the key is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a document, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> HandsetResult<()>;

    /// Remove a document. Returns true if the key existed.
    fn remove(&self, key: &str) -> bool;

    /// List all keys.
    fn keys(&self) -> Vec<String>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Escape byte in encoded file names.
const ESCAPE: char = '%';

/// File name of the empty key.
const EMPTY_KEY_NAME: &str = "%";

/// Convert a storage key to a safe file name.
///
/// - Keeps ASCII alphanumerics, `-`, `_` and `.`
/// - Writes every other byte (and a leading `.`) as `%XX`
/// - Maps the empty key to `%`
///
/// The mapping is reversible with [`file_name_key`], so distinct keys never
/// share a file.
///
/// # Examples
/// ```
/// use handset_core::key_file_name;
/// assert_eq!(key_file_name("imported_games"), "imported_games");
/// assert_eq!(key_file_name("midlet_Snake II"), "midlet_Snake%20II");
/// assert_eq!(key_file_name("../etc"), "%2E.%2Fetc");
/// ```
pub fn key_file_name(key: &str) -> String {
    if key.is_empty() {
        return EMPTY_KEY_NAME.to_string();
    }
    let mut name = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if keep {
            name.push(byte as char);
        } else {
            name.push(ESCAPE);
            name.push_str(&hex::encode_upper([byte]));
        }
    }
    name
}

/// Recover the key a file name was produced from.
///
/// Returns None for names [`key_file_name`] never produces.
///
/// # Examples
/// ```
/// use handset_core::{file_name_key, key_file_name};
/// let key = "midlet_Snake II";
/// assert_eq!(file_name_key(&key_file_name(key)).as_deref(), Some(key));
/// assert_eq!(file_name_key("bad%zz"), None);
/// ```
pub fn file_name_key(name: &str) -> Option<String> {
    if name == EMPTY_KEY_NAME {
        return Some(String::new());
    }
    let mut bytes = Vec::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find(ESCAPE) {
        bytes.extend_from_slice(rest[..pos].as_bytes());
        let code = rest.get(pos + 1..pos + 3)?;
        bytes.extend(hex::decode(code).ok()?);
        rest = &rest[pos + 3..];
    }
    bytes.extend_from_slice(rest.as_bytes());
    String::from_utf8(bytes).ok()
}
