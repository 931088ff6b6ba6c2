//! Persisted tool configuration and change fan-out
//!
//! One small JSON file under the user config directory. The store validates
//! writes, keeps the last good value on rejection, and broadcasts accepted
//! changes so live page agents pick them up without re-injection.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

/// Attribute tracked when the user has not configured one.
pub const DEFAULT_ATTRIBUTE: &str = "data-element-id";

/// Tag allow-list applied out of the box.
pub fn default_allowed_tags() -> Vec<String> {
    vec!["input".to_string(), "button".to_string()]
}

/// User-editable settings. `allowed_tags` is ordered, lowercase, and free of
/// duplicates once normalized; an empty list means "no tag filter".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub attribute_name: String,
    #[serde(default)]
    pub allowed_tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attribute_name: DEFAULT_ATTRIBUTE.to_string(),
            allowed_tags: default_allowed_tags(),
        }
    }
}

impl Config {
    pub fn new(attribute_name: impl Into<String>, allowed_tags: Vec<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            allowed_tags,
        }
    }

    /// Trim the attribute name, lowercase the tag list, drop empties, and
    /// deduplicate while preserving first-occurrence order.
    pub fn normalized(mut self) -> Self {
        self.attribute_name = self.attribute_name.trim().to_string();
        let mut tags: Vec<String> = Vec::new();
        for tag in std::mem::take(&mut self.allowed_tags) {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.allowed_tags = tags;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.attribute_name.trim().is_empty() {
            return Err(Error::ConfigError(
                "attribute name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
    base.join("designator").join("config.json")
}

/// Owns the persisted [`Config`] and fans out accepted changes.
pub struct ConfigStore {
    path: PathBuf,
    current: Mutex<Config>,
    changes: broadcast::Sender<Config>,
}

impl ConfigStore {
    /// Open the store at the default path.
    pub fn open_default() -> Self {
        Self::open(default_config_path())
    }

    /// Open a store backed by `path`, seeding the file with defaults when it
    /// does not exist yet. A corrupt or unreadable file falls back to defaults
    /// in memory without clobbering what is on disk.
    pub fn open(path: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(16);
        let current = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Config>(&raw) {
                Ok(config) => {
                    let config = config.normalized();
                    if let Err(e) = config.validate() {
                        warn!(path = %path.display(), "stored config invalid ({e}), using defaults");
                        Config::default()
                    } else {
                        debug!(path = %path.display(), "loaded config");
                        config
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), "could not parse config ({e}), using defaults");
                    Config::default()
                }
            },
            Err(_) => {
                let config = Config::default();
                if let Err(e) = persist(&path, &config) {
                    warn!(path = %path.display(), "could not seed default config: {e}");
                } else {
                    debug!(path = %path.display(), "seeded default config");
                }
                config
            }
        };
        Self {
            path,
            current: Mutex::new(current),
            changes,
        }
    }

    /// Snapshot of the current configuration. Operations take one snapshot and
    /// never re-read mid-flight.
    pub fn get(&self) -> Config {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Normalize, validate, persist, and publish a new configuration.
    ///
    /// Rejected or unpersistable values leave the previous configuration in
    /// place. Returns the stored (normalized) value.
    pub fn set(&self, config: Config) -> Result<Config> {
        let config = config.normalized();
        config.validate()?;
        persist(&self.path, &config).map_err(|e| Error::with_context("could not persist config", e))?;
        {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = config.clone();
        }
        // Nobody listening is fine.
        let _ = self.changes.send(config.clone());
        Ok(config)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Config> {
        self.changes.subscribe()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn persist(path: &Path, config: &Config) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pretty = serde_json::to_string_pretty(config)?;
    fs::write(path, pretty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::open(dir.path().join("config.json"))
    }

    #[test]
    fn seeds_defaults_on_first_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get(), Config::default());
        assert!(store.path().exists());

        // A reopened store reads the seeded file.
        let again = store_in(&dir);
        assert_eq!(again.get().attribute_name, DEFAULT_ATTRIBUTE);
    }

    #[test]
    fn set_persists_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .set(Config::new("data-qa", vec!["a".into(), "button".into()]))
            .unwrap();

        let again = store_in(&dir);
        assert_eq!(again.get().attribute_name, "data-qa");
        assert_eq!(again.get().allowed_tags, vec!["a", "button"]);
    }

    #[test]
    fn empty_attribute_rejected_and_previous_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let before = store.get();

        let err = store.set(Config::new("   ", vec![])).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        assert_eq!(store.get(), before);
    }

    #[test]
    fn normalization_lowercases_and_deduplicates_in_order() {
        let config = Config::new(
            "  data-qa ",
            vec![
                "Button".into(),
                "input".into(),
                "BUTTON".into(),
                " ".into(),
            ],
        )
        .normalized();
        assert_eq!(config.attribute_name, "data-qa");
        assert_eq!(config.allowed_tags, vec!["button", "input"]);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(path.clone());
        assert_eq!(store.get(), Config::default());
        // The broken file is left alone until the next successful set.
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn accepted_changes_reach_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut rx = store.subscribe();

        store.set(Config::new("data-test", vec![])).unwrap();
        let seen = rx.try_recv().unwrap();
        assert_eq!(seen.attribute_name, "data-test");

        // Rejected writes broadcast nothing.
        assert!(store.set(Config::new("", vec![])).is_err());
        assert!(rx.try_recv().is_err());
    }
}
