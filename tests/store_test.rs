//! Integration tests for the JSON file enrollment store

use std::path::PathBuf;
use std::sync::Arc;
use synheart_typing_auth::core::{Feature, FeatureSet, TouchProperty, FEATURE_COUNT};
use synheart_typing_auth::store::{EnrollmentKey, EnrollmentStore, JsonFileStore, StoreError};
use synheart_typing_auth::Score;

fn test_store_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("synheart-auth-{name}-{}", uuid::Uuid::new_v4()))
}

fn features(samples: usize, value: f64) -> FeatureSet {
    let mut matrices = vec![Vec::new(); FEATURE_COUNT];
    matrices[1] = vec![vec![value]; samples];
    FeatureSet::from_matrices(matrices)
}

#[test]
fn test_append_and_reopen() {
    let dir = test_store_dir("reopen");
    let key = EnrollmentKey::new(7, 1);

    {
        let store = JsonFileStore::open(&dir).unwrap();
        for i in 0..3 {
            store.append(key, features(4, i as f64), Score::NotEnoughData).unwrap();
        }
    }

    let store = JsonFileStore::open(&dir).unwrap();
    let set = store.load(key).unwrap();
    assert_eq!(set.len(), 3);
    assert!(!set.locked);
    assert_eq!(set.records[2].features, features(4, 2.0));
    assert_eq!(set.records[0].score, Score::NotEnoughData);
    assert_eq!(store.keys().unwrap(), vec![key]);

    // ids keep increasing across reopen
    let id = store.append(key, features(4, 9.0), Score::Value(0.5)).unwrap();
    assert!(set.ids().iter().all(|&existing| existing < id));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_replace_template_set() {
    let dir = test_store_dir("replace");
    let store = JsonFileStore::open(&dir).unwrap();
    let key = EnrollmentKey::new(1, 0);

    let ids: Vec<_> = (0..5)
        .map(|i| store.append(key, features(2, i as f64), Score::NotEnoughData).unwrap())
        .collect();

    store.replace_template_set(key, &[ids[1], ids[3]]).unwrap();
    let set = store.load(key).unwrap();
    assert!(set.locked);
    assert_eq!(set.ids(), vec![ids[1], ids[3]]);

    // no temporary file left behind
    let leftovers = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_unknown_template_id_leaves_set_untouched() {
    let dir = test_store_dir("unknown");
    let store = JsonFileStore::open(&dir).unwrap();
    let key = EnrollmentKey::new(1, 0);

    let id = store.append(key, features(2, 1.0), Score::NotEnoughData).unwrap();
    let result = store.replace_template_set(key, &[id, id + 100]);
    assert!(matches!(result, Err(StoreError::UnknownRecord(missing)) if missing == id + 100));

    let set = store.load(key).unwrap();
    assert_eq!(set.len(), 1);
    assert!(!set.locked);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_shape_mismatch_rejected() {
    let dir = test_store_dir("shape");
    let store = JsonFileStore::open(&dir).unwrap();
    let key = EnrollmentKey::new(1, 0);

    store.append(key, features(3, 1.0), Score::NotEnoughData).unwrap();
    let result = store.append(key, features(4, 1.0), Score::NotEnoughData);
    assert!(matches!(result, Err(StoreError::ShapeMismatch { .. })));
    assert_eq!(store.load(key).unwrap().len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_clear() {
    let dir = test_store_dir("clear");
    let store = JsonFileStore::open(&dir).unwrap();
    let a = EnrollmentKey::new(1, 0);
    let b = EnrollmentKey::new(1, 1);

    store.append(a, features(1, 1.0), Score::NotEnoughData).unwrap();
    store.append(b, features(1, 1.0), Score::NotEnoughData).unwrap();
    store.replace_template_set(a, &store.load(a).unwrap().ids()).unwrap();

    store.clear(a).unwrap();
    let cleared = store.load(a).unwrap();
    assert!(cleared.is_empty());
    assert!(!cleared.locked);
    assert_eq!(store.keys().unwrap(), vec![b]);

    // clearing a missing key is fine
    store.clear(EnrollmentKey::new(99, 0)).unwrap();

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_concurrent_appends_same_key() {
    let dir = test_store_dir("concurrent");
    let store = Arc::new(JsonFileStore::open(&dir).unwrap());
    let key = EnrollmentKey::new(3, 0);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    store
                        .append(key, features(2, (t * 10 + i) as f64), Score::NotEnoughData)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let set = store.load(key).unwrap();
    assert_eq!(set.len(), 40);
    let mut ids = set.ids();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 40);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_non_finite_values_persist() {
    let dir = test_store_dir("non-finite");
    let store = JsonFileStore::open(&dir).unwrap();
    let key = EnrollmentKey::new(5, 0);

    let mut features = FeatureSet::empty();
    features.push(Feature::Touch(TouchProperty::Pressure), vec![f64::NAN]);
    features.push(Feature::Touch(TouchProperty::Size), vec![f64::INFINITY]);
    store.append(key, features.clone(), Score::Value(f64::NAN)).unwrap();

    // the set stays readable and writable
    store.append(key, features, Score::Value(f64::NEG_INFINITY)).unwrap();
    let set = JsonFileStore::open(&dir).unwrap().load(key).unwrap();
    assert_eq!(set.len(), 2);

    let stored = &set.records[0].features;
    assert!(stored.feature(Feature::Touch(TouchProperty::Pressure)).unwrap()[0][0].is_nan());
    assert_eq!(
        stored.feature(Feature::Touch(TouchProperty::Size)).unwrap()[0][0],
        f64::INFINITY
    );
    assert!(set.records[0].score.value().unwrap().is_nan());
    assert_eq!(set.records[1].score, Score::Value(f64::NEG_INFINITY));

    let _ = std::fs::remove_dir_all(&dir);
}
