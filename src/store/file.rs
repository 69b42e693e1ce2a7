//! JSON file enrollment store.
//!
//! One file per key under the store directory, named
//! `<context>_<orientation>.json`. Every mutation rewrites the file through a
//! temporary sibling and a rename, so readers never see a half-written set.

use super::{EnrollmentKey, EnrollmentRecord, EnrollmentSet, EnrollmentStore, RecordId, StoreError};
use crate::core::features::FeatureSet;
use crate::core::scorer::Score;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// On-disk layout of one enrollment set.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedSet {
    next_id: RecordId,
    #[serde(flatten)]
    set: EnrollmentSet,
}

#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    key_locks: Mutex<HashMap<EnrollmentKey, Arc<Mutex<()>>>>,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: EnrollmentKey) -> PathBuf {
        self.root
            .join(format!("{}_{}.json", key.context_id, key.screen_orientation))
    }

    fn key_lock(&self, key: EnrollmentKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key).or_default().clone()
    }

    fn read(&self, key: EnrollmentKey) -> Result<PersistedSet, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(PersistedSet::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, key: EnrollmentKey, persisted: &PersistedSet) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(persisted)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!(key = %key, records = persisted.set.len(), "Enrollment set written");
        Ok(())
    }

    /// Read-modify-write under the key's lock.
    fn update<T>(
        &self,
        key: EnrollmentKey,
        f: impl FnOnce(&mut PersistedSet) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut persisted = self.read(key)?;
        let result = f(&mut persisted)?;
        self.write(key, &persisted)?;
        Ok(result)
    }
}

impl EnrollmentStore for JsonFileStore {
    fn load(&self, key: EnrollmentKey) -> Result<EnrollmentSet, StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read(key)?.set)
    }

    fn append(
        &self,
        key: EnrollmentKey,
        features: FeatureSet,
        score: Score,
    ) -> Result<RecordId, StoreError> {
        self.update(key, |persisted| {
            persisted.set.check_shape(&features)?;
            persisted.next_id += 1;
            let id = persisted.next_id;
            persisted.set.records.push(EnrollmentRecord {
                id,
                features,
                score,
                created_at: Utc::now(),
            });
            Ok(id)
        })
    }

    fn replace_template_set(&self, key: EnrollmentKey, keep: &[RecordId]) -> Result<(), StoreError> {
        self.update(key, |persisted| persisted.set.retain_templates(keep))
    }

    fn clear(&self, key: EnrollmentKey) -> Result<(), StoreError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<EnrollmentKey>, StoreError> {
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some((context, orientation)) = stem.split_once('_') {
                if let (Ok(context_id), Ok(screen_orientation)) =
                    (context.parse::<u64>(), orientation.parse::<i32>())
                {
                    keys.push(EnrollmentKey::new(context_id, screen_orientation));
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{Feature, TouchProperty};

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "synheart_typing_auth_{}_{}",
            name,
            uuid::Uuid::new_v4()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_file_path_and_keys() {
        let root = temp_root("keys");
        let store = JsonFileStore::open(&root).unwrap();
        let key = EnrollmentKey::new(42, -1);

        let mut features = FeatureSet::empty();
        features.push(Feature::Touch(TouchProperty::Pressure), vec![0.4]);
        store.append(key, features, Score::NotEnoughData).unwrap();

        assert!(root.join("42_-1.json").exists());
        assert_eq!(store.keys().unwrap(), vec![key]);

        store.clear(key).unwrap();
        assert!(store.keys().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }
}
