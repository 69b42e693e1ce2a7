//! In-memory enrollment store, used for evaluation runs and tests.

use super::{EnrollmentKey, EnrollmentRecord, EnrollmentSet, EnrollmentStore, RecordId, StoreError};
use crate::core::features::FeatureSet;
use crate::core::scorer::Score;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: RwLock<HashMap<EnrollmentKey, EnrollmentSet>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every enrollment set.
    pub fn clear_all(&self) {
        self.sets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl EnrollmentStore for MemoryStore {
    fn load(&self, key: EnrollmentKey) -> Result<EnrollmentSet, StoreError> {
        let sets = self.sets.read().unwrap_or_else(|e| e.into_inner());
        Ok(sets.get(&key).cloned().unwrap_or_default())
    }

    fn append(
        &self,
        key: EnrollmentKey,
        features: FeatureSet,
        score: Score,
    ) -> Result<RecordId, StoreError> {
        let mut sets = self.sets.write().unwrap_or_else(|e| e.into_inner());
        let set = sets.entry(key).or_default();
        set.check_shape(&features)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        set.records.push(EnrollmentRecord {
            id,
            features,
            score,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn replace_template_set(&self, key: EnrollmentKey, keep: &[RecordId]) -> Result<(), StoreError> {
        let mut sets = self.sets.write().unwrap_or_else(|e| e.into_inner());
        let set = sets.entry(key).or_default();
        set.retain_templates(keep)
    }

    fn clear(&self, key: EnrollmentKey) -> Result<(), StoreError> {
        self.sets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<EnrollmentKey>, StoreError> {
        let sets = self.sets.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = sets
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{Feature, TouchProperty};

    fn features(samples: usize) -> FeatureSet {
        let mut set = FeatureSet::empty();
        for i in 0..samples {
            set.push(Feature::Touch(TouchProperty::Size), vec![i as f64]);
        }
        set
    }

    #[test]
    fn test_append_and_replace() {
        let store = MemoryStore::new();
        let key = EnrollmentKey::new(1, 0);

        let ids: Vec<_> = (0..4)
            .map(|_| store.append(key, features(3), Score::NotEnoughData).unwrap())
            .collect();
        assert_eq!(store.load(key).unwrap().len(), 4);

        store.replace_template_set(key, &[ids[1], ids[3]]).unwrap();
        let set = store.load(key).unwrap();
        assert!(set.locked);
        assert_eq!(set.ids(), vec![ids[1], ids[3]]);
    }

    #[test]
    fn test_unknown_record_leaves_set_untouched() {
        let store = MemoryStore::new();
        let key = EnrollmentKey::new(1, 0);
        let id = store.append(key, features(2), Score::NotEnoughData).unwrap();

        let result = store.replace_template_set(key, &[id, id + 100]);
        assert!(matches!(result, Err(StoreError::UnknownRecord(_))));

        let set = store.load(key).unwrap();
        assert!(!set.locked);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let store = MemoryStore::new();
        let key = EnrollmentKey::new(2, 1);
        store.append(key, features(3), Score::NotEnoughData).unwrap();

        let result = store.append(key, features(4), Score::NotEnoughData);
        assert!(matches!(result, Err(StoreError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_clear_and_keys() {
        let store = MemoryStore::new();
        let a = EnrollmentKey::new(1, 0);
        let b = EnrollmentKey::new(1, 1);
        store.append(a, features(1), Score::NotEnoughData).unwrap();
        store.append(b, features(1), Score::NotEnoughData).unwrap();
        assert_eq!(store.keys().unwrap(), vec![a, b]);

        store.clear(a).unwrap();
        assert_eq!(store.keys().unwrap(), vec![b]);
        assert!(store.load(a).unwrap().is_empty());
    }
}
