//! Enrollment set persistence.
//!
//! An enrollment set holds every stored acquisition for one
//! `(context, screen orientation)` pair. Stores serialize writes per key;
//! template replacement is applied as a single transaction.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::core::features::FeatureSet;
use crate::core::scorer::Score;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identity of an enrollment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentKey {
    pub context_id: u64,
    pub screen_orientation: i32,
}

impl EnrollmentKey {
    pub fn new(context_id: u64, screen_orientation: i32) -> Self {
        Self {
            context_id,
            screen_orientation,
        }
    }
}

impl fmt::Display for EnrollmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context_id, self.screen_orientation)
    }
}

pub type RecordId = u64;

/// One stored acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: RecordId,
    pub features: FeatureSet,
    /// Score the acquisition received when it was captured
    pub score: Score,
    pub created_at: DateTime<Utc>,
}

/// All records of one key, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentSet {
    pub records: Vec<EnrollmentRecord>,
    /// Set once template selection has run for this key
    pub locked: bool,
}

impl EnrollmentSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    pub fn feature_sets(&self) -> Vec<FeatureSet> {
        self.records.iter().map(|r| r.features.clone()).collect()
    }

    /// Per-feature sample counts shared by all records.
    pub fn shape(&self) -> Option<Vec<usize>> {
        self.records.first().map(|r| r.features.shape())
    }

    pub(crate) fn check_shape(&self, features: &FeatureSet) -> Result<(), StoreError> {
        match self.shape() {
            Some(expected) if expected != features.shape() => Err(StoreError::ShapeMismatch {
                expected,
                found: features.shape(),
            }),
            _ => Ok(()),
        }
    }

    /// Keep only `keep` and lock. Fails without modifying anything if an id is unknown.
    pub(crate) fn retain_templates(&mut self, keep: &[RecordId]) -> Result<(), StoreError> {
        if let Some(&missing) = keep.iter().find(|id| !self.records.iter().any(|r| r.id == **id)) {
            return Err(StoreError::UnknownRecord(missing));
        }
        self.records.retain(|r| keep.contains(&r.id));
        self.locked = true;
        Ok(())
    }
}

/// Storage contract for enrollment sets.
pub trait EnrollmentStore: Send + Sync {
    /// Records of `key` in insertion order, plus the lock flag.
    fn load(&self, key: EnrollmentKey) -> Result<EnrollmentSet, StoreError>;

    /// Store a new acquisition and return its id.
    fn append(&self, key: EnrollmentKey, features: FeatureSet, score: Score)
        -> Result<RecordId, StoreError>;

    /// Delete every record of `key` not listed in `keep` and lock the set.
    fn replace_template_set(&self, key: EnrollmentKey, keep: &[RecordId]) -> Result<(), StoreError>;

    /// Drop all records and the lock state of `key`.
    fn clear(&self, key: EnrollmentKey) -> Result<(), StoreError>;

    /// Keys that currently hold records.
    fn keys(&self) -> Result<Vec<EnrollmentKey>, StoreError>;
}

macro_rules! forward_store {
    ($($ty:ty),*) => {
        $(impl<S: EnrollmentStore + ?Sized> EnrollmentStore for $ty {
            fn load(&self, key: EnrollmentKey) -> Result<EnrollmentSet, StoreError> {
                (**self).load(key)
            }

            fn append(
                &self,
                key: EnrollmentKey,
                features: FeatureSet,
                score: Score,
            ) -> Result<RecordId, StoreError> {
                (**self).append(key, features, score)
            }

            fn replace_template_set(&self, key: EnrollmentKey, keep: &[RecordId]) -> Result<(), StoreError> {
                (**self).replace_template_set(key, keep)
            }

            fn clear(&self, key: EnrollmentKey) -> Result<(), StoreError> {
                (**self).clear(key)
            }

            fn keys(&self) -> Result<Vec<EnrollmentKey>, StoreError> {
                (**self).keys()
            }
        })*
    };
}

forward_store!(&S, Arc<S>, Box<S>);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Feature shape {found:?} does not match enrolled shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Unknown enrollment record {0}")]
    UnknownRecord(RecordId),
}
