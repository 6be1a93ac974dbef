//! Flat key-value persistence for game state.
//!
//! Each key is one JSON file under the platform config directory. Reads
//! fall back to a default on missing or corrupt data (logged, never
//! surfaced as a user-facing error); writes go through a temp file and an
//! atomic rename so a crash mid-write cannot leave a half-written record.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Forbidden-word list (JSON array of strings).
pub const WORDS_KEY: &str = "karot_words";
/// Player roster with penalty scores.
pub const PLAYERS_KEY: &str = "karot_players";
/// Game settings.
pub const SETTINGS_KEY: &str = "karot_settings";
/// Session statistics record.
pub const STATS_KEY: &str = "k_game_state";
/// Achievement progress.
pub const ACHIEVEMENTS_KEY: &str = "k_achievements";
/// Leaderboard entries.
pub const LEADERBOARD_KEY: &str = "k_leaderboard";
/// Cloud speech usage metering.
pub const CLOUD_USAGE_KEY: &str = "k_cloud_usage";

#[derive(Debug)]
pub enum StoreError {
    NoConfigDir,
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NoConfigDir => {
                write!(f, "Could not determine a config directory for the store")
            }
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::Serialize(e) => write!(f, "Store serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// A directory of JSON records, one file per key.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open the store in the platform config directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::config_dir()
            .ok_or(StoreError::NoConfigDir)?
            .join("karot");
        Ok(Self::at(dir))
    }

    /// Open the store at an explicit directory (tests, portable installs).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Load a record, falling back to `T::default()` on any failure.
    pub fn load_or_default<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.load_or(key, T::default)
    }

    /// Load a record, falling back to `fallback()` on any failure.
    pub fn load_or<T>(&self, key: &str, fallback: impl FnOnce() -> T) -> T
    where
        T: DeserializeOwned,
    {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<T>(&contents) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("store: failed to parse {:?}: {}", path, e);
                    fallback()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => fallback(),
            Err(e) => {
                log::warn!("store: failed to read {:?}: {}", path, e);
                fallback()
            }
        }
    }

    /// Write a record atomically.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Io(format!("create {:?}: {}", self.dir, e)))?;

        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let path = self.path(key);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &contents)
            .map_err(|e| StoreError::Io(format!("write {:?}: {}", tmp_path, e)))?;

        // On Unix, rename atomically replaces the destination. On Windows it
        // fails if the destination exists, so remove it first.
        if cfg!(windows) && path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(StoreError::Io(format!("remove {:?}: {}", path, e)));
                }
            }
        }

        std::fs::rename(&tmp_path, &path)
            .map_err(|e| StoreError::Io(format!("rename {:?} to {:?}: {}", tmp_path, path, e)))
    }

    pub fn remove(&self, key: &str) {
        let path = self.path(key);
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("store: failed to remove {:?}: {}", path, e);
            }
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Record {
        count: u32,
        name: String,
    }

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = Store::at(dir.path().join("karot"));
        (dir, store)
    }

    #[test]
    fn round_trips_a_record() {
        let (_guard, store) = temp_store();
        let record = Record {
            count: 3,
            name: "elma".into(),
        };
        store.save("test", &record).unwrap();
        assert_eq!(store.load_or_default::<Record>("test"), record);
    }

    #[test]
    fn missing_key_yields_default() {
        let (_guard, store) = temp_store();
        assert_eq!(store.load_or_default::<Record>("missing"), Record::default());
    }

    #[test]
    fn corrupt_record_yields_default() {
        let (_guard, store) = temp_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("broken.json"), "{not json").unwrap();
        assert_eq!(store.load_or_default::<Record>("broken"), Record::default());
    }

    #[test]
    fn save_overwrites_previous_value() {
        let (_guard, store) = temp_store();
        store.save("test", &Record { count: 1, name: "a".into() }).unwrap();
        store.save("test", &Record { count: 2, name: "b".into() }).unwrap();
        assert_eq!(store.load_or_default::<Record>("test").count, 2);
    }

    #[test]
    fn remove_forgets_the_record() {
        let (_guard, store) = temp_store();
        store.save("test", &Record::default()).unwrap();
        store.remove("test");
        assert_eq!(store.load_or_default::<Record>("test"), Record::default());
        // Removing again is harmless
        store.remove("test");
    }
}
