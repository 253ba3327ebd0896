//! Game import from JAR (ZIP) archives.
//!
//! An archive may carry a `META-INF/MANIFEST.MF` and/or a `.jad` descriptor
//! entry. Both are `Key: Value` line files; descriptor values win over
//! manifest values, which win over the file name and built-in defaults.
//! The whole archive is kept as the game's payload.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::catalog::{GameDescriptor, Icon, Origin};
use crate::error::{HandsetError, HandsetResult};

/// Manifest entry path inside the archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Extension of descriptor entries (matched case-insensitively).
pub const DESCRIPTOR_EXT: &str = ".jad";

/// Extension accepted by the upload pre-check.
pub const ARCHIVE_EXT: &str = "jar";

/// Icon file-name suffixes, highest priority first. The last one matches
/// any PNG.
const ICON_SUFFIXES: &[&str] = &["icon.png", "logo.png", "game.png", ".png"];

const NAME_KEY: &str = "MIDlet-Name";
const VENDOR_KEY: &str = "MIDlet-Vendor";
const VERSION_KEY: &str = "MIDlet-Version";
const DESCRIPTION_KEY: &str = "MIDlet-Description";

const DEFAULT_VENDOR: &str = "Unknown";
const DEFAULT_VERSION: &str = "1.0";

/// Parsed `Key: Value` attributes. Later keys overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(HashMap<String, String>);

impl Attributes {
    /// Parse line-oriented attributes.
    ///
    /// Each non-blank line containing a colon is split on its first colon;
    /// key and value are trimmed. Lines without a colon are skipped.
    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self(map)
    }

    /// Value for `key`, treating empty values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reject files that are not `.jar` before any parse attempt.
pub fn check_extension(file_name: &str) -> HandsetResult<()> {
    let ok = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXT));
    if ok {
        Ok(())
    } else {
        Err(HandsetError::UnsupportedFile(file_name.to_string()))
    }
}

/// Import a game from a file path (extension pre-check, then parse).
pub fn import_file(path: &Path) -> HandsetResult<GameDescriptor> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    check_extension(&file_name)?;
    let bytes = std::fs::read(path)?;
    parse_archive(bytes, &file_name)
}

/// Parse archive bytes into an imported game descriptor.
///
/// `file_name` is the uploaded file's name; its stem is the fallback game
/// name. Fails with `InvalidArchive` if the container cannot be read.
pub fn parse_archive(bytes: Vec<u8>, file_name: &str) -> HandsetResult<GameDescriptor> {
    let contents = read_contents(Cursor::new(bytes.as_slice()))?;

    let manifest = contents.manifest.as_deref().map(Attributes::parse).unwrap_or_default();
    let descriptor = contents.descriptor.as_deref().map(Attributes::parse).unwrap_or_default();
    debug!(
        file_name,
        manifest_keys = manifest.len(),
        descriptor_keys = descriptor.len(),
        "read archive metadata"
    );

    let resolve = |key: &str| -> Option<String> {
        descriptor
            .get(key)
            .or_else(|| manifest.get(key))
            .map(|v| v.to_string())
    };

    let name = resolve(NAME_KEY).unwrap_or_else(|| name_from_file(file_name));
    let vendor = resolve(VENDOR_KEY).unwrap_or_else(|| DEFAULT_VENDOR.to_string());
    let version = resolve(VERSION_KEY).unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let description = resolve(DESCRIPTION_KEY).unwrap_or_default();

    let now = Utc::now();
    let game = GameDescriptor {
        id: new_import_id(now),
        name,
        vendor,
        version,
        description,
        size_label: size_label(bytes.len()),
        icon: contents.icon,
        payload: Some(bytes),
        origin: Origin::Imported,
        imported_at: Some(now),
    };

    info!(id = %game.id, name = %game.name, size = %game.size_label, "parsed archive");
    Ok(game)
}

/// Metadata pulled out of an archive in one pass.
struct ArchiveContents {
    manifest: Option<String>,
    descriptor: Option<String>,
    icon: Option<Icon>,
}

fn read_contents<R: Read + Seek>(reader: R) -> HandsetResult<ArchiveContents> {
    let mut archive = ZipArchive::new(reader).map_err(invalid_archive)?;

    // Names come from the central directory; only the entries we need are opened
    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.name_for_index(i))
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect();

    let manifest_entry = names.iter().find(|name| name.as_str() == MANIFEST_PATH);
    let descriptor_entry = names
        .iter()
        .find(|name| name.to_lowercase().ends_with(DESCRIPTOR_EXT));
    let png_entries: Vec<String> = names
        .iter()
        .filter(|name| name.to_lowercase().ends_with(".png"))
        .cloned()
        .collect();

    let manifest = manifest_entry
        .and_then(|entry| read_entry(&mut archive, entry))
        .map(|data| String::from_utf8_lossy(&data).into_owned());
    let descriptor = descriptor_entry
        .and_then(|entry| read_entry(&mut archive, entry))
        .map(|data| String::from_utf8_lossy(&data).into_owned());
    let icon = pick_icon(&png_entries)
        .and_then(|entry| read_entry(&mut archive, entry).and_then(|data| decode_icon(entry, data)));

    Ok(ArchiveContents {
        manifest,
        descriptor,
        icon,
    })
}

/// Read one entry. Entries that cannot be opened (encrypted, unsupported
/// compression) are skipped rather than failing the import.
fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let result = archive.by_name(name).and_then(|mut file| {
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    });
    match result {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(entry = name, error = %e, "archive entry unreadable, skipping");
            None
        }
    }
}

/// Choose the icon entry by suffix priority, first archive match wins.
fn pick_icon(png_entries: &[String]) -> Option<&str> {
    ICON_SUFFIXES.iter().find_map(|suffix| {
        png_entries
            .iter()
            .find(|name| name.to_lowercase().ends_with(suffix))
            .map(|name| name.as_str())
    })
}

fn decode_icon(entry: &str, data: Vec<u8>) -> Option<Icon> {
    match image::load_from_memory_with_format(&data, image::ImageFormat::Png) {
        Ok(img) => Some(Icon {
            mime_type: "image/png".to_string(),
            width: img.width(),
            height: img.height(),
            data,
        }),
        Err(e) => {
            warn!(entry, error = %e, "icon entry is not a readable PNG, skipping");
            None
        }
    }
}

fn invalid_archive(e: impl std::fmt::Display) -> HandsetError {
    HandsetError::InvalidArchive(e.to_string())
}

/// Uploaded file name without its extension.
fn name_from_file(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name)
        .to_string()
}

/// Rounded size in kilobytes, e.g. "64KB".
pub fn size_label(len: usize) -> String {
    format!("{}KB", (len as f64 / 1024.0).round() as u64)
}

/// Timestamp plus random suffix; unique enough for one catalog.
pub fn new_import_id(now: DateTime<Utc>) -> String {
    let suffix = Alphanumeric
        .sample_string(&mut rand::rng(), 9)
        .to_lowercase();
    format!("imported_{}_{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{build_archive, png_bytes};

    #[test]
    fn test_descriptor_name_used() {
        let data = build_archive(&[("game.jad", b"MIDlet-Name: Foo\n".as_slice())]);
        let game = parse_archive(data, "whatever.jar").unwrap();
        assert_eq!(game.name, "Foo");
    }

    #[test]
    fn test_name_falls_back_to_file_stem() {
        let data = build_archive(&[("Main.class", b"\xCA\xFE\xBA\xBE".as_slice())]);
        let game = parse_archive(data, "bar.jar").unwrap();

        assert_eq!(game.name, "bar");
        assert_eq!(game.vendor, "Unknown");
        assert_eq!(game.version, "1.0");
        assert_eq!(game.description, "");
        assert!(game.icon.is_none());
    }

    #[test]
    fn test_descriptor_overrides_manifest() {
        let manifest = b"Manifest-Version: 1.0\r\nMIDlet-Name: FromManifest\r\nMIDlet-Vendor: Acme\r\nMIDlet-Version: 2.1\r\n";
        let jad = b"MIDlet-Name: FromJad\nMIDlet-Description: A: colon game\n";
        let data = build_archive(&[
            (MANIFEST_PATH, manifest.as_slice()),
            ("x/Game.JAD", jad.as_slice()),
        ]);

        let game = parse_archive(data, "g.jar").unwrap();
        assert_eq!(game.name, "FromJad");
        assert_eq!(game.vendor, "Acme");
        assert_eq!(game.version, "2.1");
        assert_eq!(game.description, "A: colon game");
    }

    #[test]
    fn test_empty_value_falls_through() {
        let data = build_archive(&[
            (MANIFEST_PATH, b"MIDlet-Name: Real\n".as_slice()),
            ("a.jad", b"MIDlet-Name:   \n".as_slice()),
        ]);
        let game = parse_archive(data, "g.jar").unwrap();
        assert_eq!(game.name, "Real");
    }

    #[test]
    fn test_payload_is_whole_archive() {
        let data = build_archive(&[("a.txt", b"hello".as_slice())]);
        let game = parse_archive(data.clone(), "a.jar").unwrap();

        assert_eq!(game.payload, Some(data));
        assert_eq!(game.origin, Origin::Imported);
        assert!(game.imported_at.is_some());
    }

    #[test]
    fn test_invalid_archive() {
        let result = parse_archive(b"definitely not a zip".to_vec(), "broken.jar");
        assert!(matches!(result, Err(HandsetError::InvalidArchive(_))));
    }

    #[test]
    fn test_icon_priority() {
        let png = png_bytes(4, 3);
        let other = png_bytes(1, 1);
        let data = build_archive(&[
            ("res/a.png", other.as_slice()),
            ("res/Logo.PNG", other.as_slice()),
            ("res/icon.png", png.as_slice()),
        ]);

        let icon = parse_archive(data, "g.jar").unwrap().icon.unwrap();
        assert_eq!((icon.width, icon.height), (4, 3));
        assert_eq!(icon.mime_type, "image/png");
        assert_eq!(icon.data, png);
    }

    #[test]
    fn test_icon_any_png_fallback() {
        let png = png_bytes(2, 2);
        let data = build_archive(&[("sprites/hero.png", png.as_slice())]);
        let icon = parse_archive(data, "g.jar").unwrap().icon.unwrap();
        assert_eq!(icon.width, 2);
    }

    #[test]
    fn test_undecodable_icon_skipped() {
        let data = build_archive(&[("icon.png", b"not a png".as_slice())]);
        assert!(parse_archive(data, "g.jar").unwrap().icon.is_none());
    }

    /// Rewrite the compression method of `entry` to Implode (6), which the
    /// zip reader refuses to open.
    fn mark_unsupported(mut data: Vec<u8>, entry: &str) -> Vec<u8> {
        const LOCAL: (&[u8], usize, usize, usize) = (b"PK\x03\x04", 8, 26, 30);
        const CENTRAL: (&[u8], usize, usize, usize) = (b"PK\x01\x02", 10, 28, 46);
        let mut patched = 0;
        for (sig, method_at, name_len_at, name_at) in [LOCAL, CENTRAL] {
            let mut pos = 0;
            while pos + name_at <= data.len() {
                if &data[pos..pos + 4] == sig {
                    let len = u16::from_le_bytes([data[pos + name_len_at], data[pos + name_len_at + 1]])
                        as usize;
                    let start = pos + name_at;
                    if data.get(start..start + len) == Some(entry.as_bytes()) {
                        data[pos + method_at..pos + method_at + 2].copy_from_slice(&6u16.to_le_bytes());
                        patched += 1;
                    }
                }
                pos += 1;
            }
        }
        assert_eq!(patched, 2, "entry {entry} not found in both headers");
        data
    }

    #[test]
    fn test_unreadable_class_entry_does_not_fail_import() {
        let data = build_archive(&[
            ("game.jad", b"MIDlet-Name: Sealed\nMIDlet-Vendor: Acme\n".as_slice()),
            ("Secret.class", b"\xCA\xFE\xBA\xBE".as_slice()),
        ]);
        let data = mark_unsupported(data, "Secret.class");

        let game = parse_archive(data.clone(), "sealed.jar").unwrap();
        assert_eq!(game.name, "Sealed");
        assert_eq!(game.vendor, "Acme");
        assert_eq!(game.payload.as_deref(), Some(data.as_slice()));
    }

    #[test]
    fn test_unreadable_icon_entry_skipped() {
        let png = png_bytes(4, 4);
        let data = build_archive(&[
            ("game.jad", b"MIDlet-Name: NoIcon\n".as_slice()),
            ("icon.png", png.as_slice()),
        ]);
        let data = mark_unsupported(data, "icon.png");

        let game = parse_archive(data, "g.jar").unwrap();
        assert_eq!(game.name, "NoIcon");
        assert!(game.icon.is_none());
    }

    #[test]
    fn test_unreadable_descriptor_falls_back_to_manifest() {
        let data = build_archive(&[
            (MANIFEST_PATH, b"MIDlet-Name: FromManifest\n".as_slice()),
            ("game.jad", b"MIDlet-Name: FromJad\n".as_slice()),
        ]);
        let data = mark_unsupported(data, "game.jad");
        assert_eq!(parse_archive(data, "g.jar").unwrap().name, "FromManifest");
    }

    #[test]
    fn test_attributes_later_keys_win() {
        let attrs = Attributes::parse("A: 1\n\nnoise line\nA: 2\nURL: http://x/y\n");
        assert_eq!(attrs.get("A"), Some("2"));
        assert_eq!(attrs.get("URL"), Some("http://x/y"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_check_extension() {
        assert!(check_extension("game.jar").is_ok());
        assert!(check_extension("GAME.JAR").is_ok());
        assert!(matches!(
            check_extension("game.zip"),
            Err(HandsetError::UnsupportedFile(_))
        ));
        assert!(check_extension("jar").is_err());
    }

    #[test]
    fn test_import_file_rejects_before_reading() {
        // Path does not exist; the extension check must fail first
        let result = import_file(Path::new("/nonexistent/game.txt"));
        assert!(matches!(result, Err(HandsetError::UnsupportedFile(_))));
    }

    #[test]
    fn test_size_label() {
        assert_eq!(size_label(0), "0KB");
        assert_eq!(size_label(1536), "2KB");
        assert_eq!(size_label(64 * 1024), "64KB");
    }

    #[test]
    fn test_import_id_shape() {
        let now = Utc::now();
        let id = new_import_id(now);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "imported");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(new_import_id(now), id);
    }
}
