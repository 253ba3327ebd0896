//! Game catalog: built-in entries plus imported archives persisted in a
//! `KvStore`.
//!
//! Imported games are stored as one JSON document under [`CATALOG_KEY`].
//! Binary fields (archive payload, icon) are hex-encoded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HandsetError, HandsetResult};
use crate::storage::KvStore;

/// Storage key of the imported-games document.
pub const CATALOG_KEY: &str = "imported_games";

/// Where a catalog entry comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Defined in code, always present, never persisted.
    Builtin,
    /// Created from an uploaded archive.
    Imported,
}

/// Embeddable icon image taken from an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(with = "hex_serde::bytes")]
    pub data: Vec<u8>,
}

/// Metadata record for one playable entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDescriptor {
    pub id: String,
    pub name: String,
    pub vendor: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub size_label: String,
    #[serde(default)]
    pub icon: Option<Icon>,
    /// Entire original archive. Present only for imported entries.
    #[serde(default, with = "hex_serde::opt_bytes", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    pub origin: Origin,
    #[serde(default)]
    pub imported_at: Option<DateTime<Utc>>,
}

impl GameDescriptor {
    pub fn is_builtin(&self) -> bool {
        self.origin == Origin::Builtin
    }

    /// Archive bytes, if present and non-empty.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref().filter(|p| !p.is_empty())
    }
}

/// Games implemented in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinGame {
    Snake,
}

impl BuiltinGame {
    pub const ALL: &'static [BuiltinGame] = &[BuiltinGame::Snake];

    pub fn id(self) -> &'static str {
        match self {
            BuiltinGame::Snake => "snake",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|g| g.id() == id)
    }

    pub fn descriptor(self) -> GameDescriptor {
        match self {
            BuiltinGame::Snake => GameDescriptor {
                id: self.id().to_string(),
                name: "Snake Classic".to_string(),
                vendor: "Handset".to_string(),
                version: "1.0".to_string(),
                description: "Eat, grow, and don't bite your own tail.".to_string(),
                size_label: "64KB".to_string(),
                icon: None,
                payload: None,
                origin: Origin::Builtin,
                imported_at: None,
            },
        }
    }
}

/// Catalog of built-in and imported games.
#[derive(Clone)]
pub struct GameCatalog {
    store: Arc<dyn KvStore>,
}

impl GameCatalog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Built-in entries, in declaration order.
    pub fn builtins() -> Vec<GameDescriptor> {
        BuiltinGame::ALL.iter().map(|g| g.descriptor()).collect()
    }

    /// All entries: built-ins first, then imports in creation order.
    pub fn list(&self) -> Vec<GameDescriptor> {
        let mut games = Self::builtins();
        games.extend(self.imported());
        games
    }

    /// Imported entries only.
    ///
    /// A missing or unreadable document yields an empty list.
    pub fn imported(&self) -> Vec<GameDescriptor> {
        let Some(text) = self.store.get(CATALOG_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<GameDescriptor>>(&text) {
            Ok(games) => games,
            Err(e) => {
                warn!(error = %e, "catalog document unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Find an entry by id.
    pub fn get(&self, id: &str) -> Option<GameDescriptor> {
        if let Some(builtin) = BuiltinGame::from_id(id) {
            return Some(builtin.descriptor());
        }
        self.imported().into_iter().find(|g| g.id == id)
    }

    /// Append an imported entry and persist the catalog.
    pub fn save(&self, descriptor: GameDescriptor) -> HandsetResult<()> {
        if descriptor.is_builtin() {
            return Err(HandsetError::BuiltinImmutable(descriptor.id));
        }
        if descriptor.payload().is_none() {
            return Err(HandsetError::EmptyPayload(descriptor.id));
        }

        let mut games = self.imported();
        if BuiltinGame::from_id(&descriptor.id).is_some()
            || games.iter().any(|g| g.id == descriptor.id)
        {
            return Err(HandsetError::DuplicateId(descriptor.id));
        }

        info!(id = %descriptor.id, name = %descriptor.name, "saving imported game");
        games.push(descriptor);
        self.write_imported(&games)
    }

    /// Remove one imported entry. Returns false if no entry had that id.
    pub fn delete(&self, id: &str) -> HandsetResult<bool> {
        if BuiltinGame::from_id(id).is_some() {
            return Err(HandsetError::BuiltinImmutable(id.to_string()));
        }

        let mut games = self.imported();
        let Some(idx) = games.iter().position(|g| g.id == id) else {
            debug!(id, "delete of unknown game ignored");
            return Ok(false);
        };
        games.remove(idx);
        info!(id, "deleted imported game");
        self.write_imported(&games)?;
        Ok(true)
    }

    fn write_imported(&self, games: &[GameDescriptor]) -> HandsetResult<()> {
        let json = serde_json::to_string(games)?;
        self.store.set(CATALOG_KEY, &json)
    }
}

/// Hex encoding for binary fields.
mod hex_serde {
    pub mod bytes {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&hex::encode(data))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
            let text = String::deserialize(deserializer)?;
            hex::decode(text).map_err(serde::de::Error::custom)
        }
    }

    pub mod opt_bytes {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            data: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match data {
                Some(data) => serializer.serialize_some(&hex::encode(data)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let text = Option::<String>::deserialize(deserializer)?;
            text.map(|t| hex::decode(t).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn imported(id: &str, payload: &[u8]) -> GameDescriptor {
        GameDescriptor {
            id: id.to_string(),
            name: format!("Game {id}"),
            vendor: "Unknown".to_string(),
            version: "1.0".to_string(),
            description: String::new(),
            size_label: "1KB".to_string(),
            icon: None,
            payload: Some(payload.to_vec()),
            origin: Origin::Imported,
            imported_at: Some(Utc::now()),
        }
    }

    fn catalog() -> (GameCatalog, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (GameCatalog::new(store.clone()), store)
    }

    #[test]
    fn test_builtins_listed_first() {
        let (catalog, _) = catalog();
        catalog.save(imported("a", b"PK")).unwrap();

        let ids: Vec<String> = catalog.list().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec!["snake".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_save_list_roundtrip_payload() {
        let (catalog, _) = catalog();
        let payload: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();
        catalog.save(imported("bin", &payload)).unwrap();

        let listed = catalog.get("bin").unwrap();
        assert_eq!(listed.payload.as_deref(), Some(payload.as_slice()));
    }

    #[test]
    fn test_payload_persisted_as_hex() {
        let (catalog, store) = catalog();
        catalog.save(imported("hex", &[0xde, 0xad, 0xbe, 0xef])).unwrap();

        let doc = store.get(CATALOG_KEY).unwrap();
        assert!(doc.contains("\"deadbeef\""));
    }

    #[test]
    fn test_delete_preserves_order() {
        let (catalog, _) = catalog();
        for id in ["a", "b", "c", "d"] {
            catalog.save(imported(id, b"x")).unwrap();
        }

        assert!(catalog.delete("b").unwrap());

        let ids: Vec<String> = catalog.imported().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let (catalog, _) = catalog();
        catalog.save(imported("a", b"x")).unwrap();

        assert!(!catalog.delete("zzz").unwrap());
        assert_eq!(catalog.imported().len(), 1);
    }

    #[test]
    fn test_builtin_cannot_be_deleted_or_shadowed() {
        let (catalog, _) = catalog();

        assert!(matches!(
            catalog.delete("snake"),
            Err(HandsetError::BuiltinImmutable(_))
        ));
        assert!(matches!(
            catalog.save(imported("snake", b"x")),
            Err(HandsetError::DuplicateId(_))
        ));
        assert!(matches!(
            catalog.save(BuiltinGame::Snake.descriptor()),
            Err(HandsetError::BuiltinImmutable(_))
        ));
    }

    #[test]
    fn test_duplicate_and_empty_payload_rejected() {
        let (catalog, _) = catalog();
        catalog.save(imported("a", b"x")).unwrap();

        assert!(matches!(
            catalog.save(imported("a", b"y")),
            Err(HandsetError::DuplicateId(_))
        ));
        assert!(matches!(
            catalog.save(imported("b", b"")),
            Err(HandsetError::EmptyPayload(_))
        ));
    }

    #[test]
    fn test_corrupt_document_degrades_to_empty() {
        let store = Arc::new(MemoryStore::with_documents([(CATALOG_KEY, "{not json")]));
        let catalog = GameCatalog::new(store);

        assert!(catalog.imported().is_empty());
        assert_eq!(catalog.list().len(), GameCatalog::builtins().len());

        // A later save replaces the unreadable document
        catalog.save(imported("a", b"x")).unwrap();
        assert_eq!(catalog.imported().len(), 1);
    }

    #[test]
    fn test_icon_roundtrip() {
        let (catalog, _) = catalog();
        let mut game = imported("icon", b"x");
        game.icon = Some(Icon {
            mime_type: "image/png".into(),
            width: 16,
            height: 16,
            data: vec![0x89, b'P', b'N', b'G'],
        });
        catalog.save(game.clone()).unwrap();

        assert_eq!(catalog.get("icon").unwrap().icon, game.icon);
    }
}
