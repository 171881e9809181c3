use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{PackError, PackResult};

/// Classifier decision for one mod file, persisted as its literal name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Client,
    Universal,
    Unknown,
    Error,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Client => "CLIENT",
            Verdict::Universal => "UNIVERSAL",
            Verdict::Unknown => "UNKNOWN",
            Verdict::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted file-name → verdict map. Loaded once per batch, mutated by
/// concurrent classification tasks (each owns its own key), written back
/// once after the batch joins.
pub struct ClassificationCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Verdict>>,
}

impl ClassificationCache {
    /// Read the cache file. A missing or corrupt file yields an empty
    /// cache; loading never fails.
    pub async fn load(path: PathBuf) -> Self {
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, Verdict>>(&bytes) {
                Ok(map) => {
                    debug!("Loaded {} cached verdicts from {:?}", map.len(), path);
                    map
                }
                Err(e) => {
                    warn!("Classification cache {:?} is corrupt ({}), starting empty", path, e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, name: &str) -> Option<Verdict> {
        self.entries.lock().expect("cache lock poisoned").get(name).copied()
    }

    pub fn set(&self, name: impl Into<String>, verdict: Verdict) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(name.into(), verdict);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full-file rewrite as pretty-printed JSON.
    pub async fn save(&self) -> PackResult<()> {
        let json = {
            let entries = self.entries.lock().expect("cache lock poisoned");
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PackError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| PackError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        debug!("Saved {} verdicts to {:?}", self.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ClassificationCache::load(dir.path().join("absent.json")).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let cache = ClassificationCache::load(path).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = ClassificationCache::load(path.clone()).await;
        cache.set("alpha.jar", Verdict::Client);
        cache.set("beta.jar", Verdict::Universal);
        cache.save().await.unwrap();

        let reloaded = ClassificationCache::load(path.clone()).await;
        assert_eq!(reloaded.get("alpha.jar"), Some(Verdict::Client));
        assert_eq!(reloaded.get("beta.jar"), Some(Verdict::Universal));

        // On-disk form is a plain JSON object with the literal verdict
        // strings other tools read.
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("\"alpha.jar\": \"CLIENT\""));
        assert!(raw.contains("\"beta.jar\": \"UNIVERSAL\""));
    }

    #[test]
    fn verdict_strings_are_stable() {
        for (verdict, s) in [
            (Verdict::Client, "CLIENT"),
            (Verdict::Universal, "UNIVERSAL"),
            (Verdict::Unknown, "UNKNOWN"),
            (Verdict::Error, "ERROR"),
        ] {
            assert_eq!(verdict.as_str(), s);
            assert_eq!(serde_json::to_string(&verdict).unwrap(), format!("\"{s}\""));
        }
    }
}
