// Integration tests for the signature store
mod common;

use common::*;
use imgmatch_rust::imgstore::{SignatureRecord, SignatureStorage};
use imgmatch_rust::imgstructs::{SignatureOptions, StoreConfig};
use imgmatch_rust::imgorient::rotate;
use imgmatch_rust::imgwords::WordTerm;
use imgmatch_rust::{
    ImageSignature, MemoryStorage, Orientation, PixelBuffer, Rgba, Signature, SignatureError,
    SignatureStore, StoreError,
};
use std::cell::{Cell, RefCell};
use thiserror::Error;

type Meta = String;

fn store() -> SignatureStore<MemoryStorage<Meta>, Meta> {
    SignatureStore::new(MemoryStorage::new())
}

#[test]
fn end_to_end_index_and_search() {
    let mut store = store();
    let a = default_scene();
    let sig = store.index("a", &a, "first".to_string()).unwrap();
    assert_eq!(sig.len(), 648);
    assert_eq!(store.storage().len(), 1);

    let unrelated = store.search(&rings(SCENE_WIDTH, SCENE_HEIGHT), false).unwrap();
    assert!(unrelated.iter().all(|m| m.key != "a"));

    let hits = store.search(&a, false).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "a");
    assert_eq!(hits[0].dist, 0.0);
    assert_eq!(hits[0].metadata, "first");
}

#[test]
fn near_duplicates_are_found() {
    let mut store = store();
    let a = default_scene();
    store.index("a", &a, String::new()).unwrap();
    store.index("rings", &rings(SCENE_WIDTH, SCENE_HEIGHT), String::new()).unwrap();

    for query in [brighten(&a, 10), downscale_half(&a)] {
        let hits = store.search(&query, false).unwrap();
        let keys: Vec<&str> = hits.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a"]);
        assert!(hits[0].dist < 0.4);
    }
}

#[test]
fn rotated_copy_needs_all_orientations() {
    let mut store = store();
    let a = default_scene();
    store.index("a", &a, String::new()).unwrap();

    let rotated = rotate(&a, Orientation::Deg90).unwrap();
    assert!(store.search(&rotated, false).unwrap().is_empty());

    let hits = store.search(&rotated, true).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "a");
    assert!(hits[0].dist < store.config().match_threshold);
}

#[test]
fn upsert_replaces_and_delete_removes() {
    let mut store = store();
    let a = default_scene();
    store.index("k", &a, "old".to_string()).unwrap();
    store.index("k", &a, "new".to_string()).unwrap();
    assert_eq!(store.storage().len(), 1);

    let hits = store.search(&a, false).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata, "new");

    store.delete("k").unwrap();
    assert!(store.storage().is_empty());
    assert!(store.search(&a, false).unwrap().is_empty());

    // unknown keys are not an error
    store.delete("missing").unwrap();
}

#[test]
fn precomputed_signatures_can_be_indexed_and_searched() {
    let mut store = store();
    let sig = ImageSignature::default().generate(&default_scene()).unwrap();
    store.index_signature("pre", sig.clone(), String::new()).unwrap();
    let hits = store.search_signature(&sig).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "pre");
}

#[test]
fn search_on_empty_store_is_empty() {
    let store = store();
    assert!(store.search(&default_scene(), true).unwrap().is_empty());
}

#[test]
fn invalid_word_layout_fails_before_storage() {
    let config = StoreConfig {
        word_width: 17,
        ..StoreConfig::with_signature(SignatureOptions {
            grid_point_num: 1,
            ..SignatureOptions::default()
        })
    };
    let mut store: SignatureStore<_, Meta> =
        SignatureStore::with_config(MemoryStorage::new(), config).unwrap();
    let err = store
        .index("a", &default_scene(), String::new())
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Signature(SignatureError::WordWidthTooLarge { .. })
    ));
    assert!(store.storage().is_empty());
}

#[test]
fn invalid_signature_options_are_rejected_by_config() {
    let config = StoreConfig::with_signature(SignatureOptions::with_crop(50, 50));
    let result: Result<SignatureStore<_, Meta>, _> =
        SignatureStore::with_config(MemoryStorage::new(), config);
    assert!(result.is_err());
}

// ==============================================
// Scripted storage
// ==============================================

#[derive(Debug, Error)]
#[error("backend unavailable")]
struct Unavailable;

/// Storage answering each query with the next scripted batch and counting
/// every call it receives.
#[derive(Default)]
struct ScriptedStorage {
    batches: RefCell<Vec<Vec<SignatureRecord<u32>>>>,
    queries: Cell<usize>,
    upserts: usize,
    fail: bool,
}

impl SignatureStorage<u32> for ScriptedStorage {
    type Error = Unavailable;

    fn upsert(&mut self, _record: SignatureRecord<u32>) -> Result<(), Unavailable> {
        self.upserts += 1;
        if self.fail {
            return Err(Unavailable);
        }
        Ok(())
    }

    fn query_by_any_term(&self, _terms: &[WordTerm]) -> Result<Vec<SignatureRecord<u32>>, Unavailable> {
        self.queries.set(self.queries.get() + 1);
        if self.fail {
            return Err(Unavailable);
        }
        let mut batches = self.batches.borrow_mut();
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        Ok(batches.remove(0))
    }

    fn delete(&mut self, _key: &str) -> Result<(), Unavailable> {
        if self.fail {
            return Err(Unavailable);
        }
        Ok(())
    }
}

fn record(key: &str, signature: Signature, metadata: u32) -> SignatureRecord<u32> {
    SignatureRecord {
        key: key.to_string(),
        signature,
        words: Vec::new(),
        metadata,
    }
}

/// Flip the sign of the first `count` non-zero levels.
fn perturb(signature: &Signature, count: usize) -> Signature {
    let mut levels = signature.as_slice().to_vec();
    levels
        .iter_mut()
        .filter(|v| **v != 0)
        .take(count)
        .for_each(|v| *v = -*v);
    Signature::new(levels)
}

#[test]
fn earliest_orientation_wins_deduplication() {
    let image = default_scene();
    let sigs = ImageSignature::default()
        .generate_all_orientations(&image)
        .unwrap();

    let storage = ScriptedStorage {
        batches: RefCell::new(vec![
            vec![record("x", perturb(&sigs[0], 20), 0)],
            vec![record("x", sigs[1].clone(), 1)],
        ]),
        ..ScriptedStorage::default()
    };
    let store: SignatureStore<_, u32> = SignatureStore::new(storage);

    let hits = store.search(&image, true).unwrap();
    assert_eq!(store.storage().queries.get(), 4);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata, 0);
    assert!(hits[0].dist > 0.0 && hits[0].dist < 0.4, "dist = {}", hits[0].dist);
}

#[test]
fn far_candidates_are_dropped_before_dedup() {
    let image = default_scene();
    let sigs = ImageSignature::default()
        .generate_all_orientations(&image)
        .unwrap();
    let negated = Signature::new(sigs[0].iter().map(|v| -v).collect());

    let storage = ScriptedStorage {
        batches: RefCell::new(vec![
            vec![record("x", negated, 0)],
            vec![record("x", sigs[1].clone(), 1)],
        ]),
        ..ScriptedStorage::default()
    };
    let store: SignatureStore<_, u32> = SignatureStore::new(storage);

    let hits = store.search(&image, true).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata, 1);
    assert_eq!(hits[0].dist, 0.0);
}

#[test]
fn empty_key_never_reaches_storage() {
    let mut store: SignatureStore<_, u32> = SignatureStore::new(ScriptedStorage::default());
    for key in ["", "   "] {
        let err = store.index(key, &default_scene(), 0).unwrap_err();
        assert!(matches!(err, StoreError::Signature(SignatureError::EmptyKey)));
    }
    assert_eq!(store.storage().upserts, 0);
}

#[test]
fn storage_errors_propagate() {
    let storage = ScriptedStorage {
        fail: true,
        ..ScriptedStorage::default()
    };
    let mut store: SignatureStore<_, u32> = SignatureStore::new(storage);

    let err = store.index("a", &default_scene(), 0).unwrap_err();
    assert!(matches!(err, StoreError::Storage(Unavailable)));
    assert_eq!(err.to_string(), "backend unavailable");

    let err = store.search(&default_scene(), true).unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
    // the first failing pass stops the search
    assert_eq!(store.storage().queries.get(), 1);

    assert!(store.delete("a").is_err());
}

#[test]
fn flat_images_are_still_indexed() {
    let mut store: SignatureStore<_, u32> = SignatureStore::new(ScriptedStorage::default());
    let image = PixelBuffer::filled(4, 4, Rgba::opaque(1, 2, 3)).unwrap();
    let sig = store.index("flat", &image, 7).unwrap();
    assert!(sig.is_zero());
    assert_eq!(store.storage().upserts, 1);
}

#[test]
fn search_signature_narrows_the_raw_candidates() {
    let sig = ImageSignature::default().generate(&default_scene()).unwrap();
    let negated = Signature::new(sig.iter().map(|v| -v).collect());
    let batch = vec![
        record("far", negated, 0),
        record("x", sig.clone(), 1),
        record("x", perturb(&sig, 20), 2),
    ];
    let storage = ScriptedStorage {
        batches: RefCell::new(vec![batch.clone(), batch]),
        ..ScriptedStorage::default()
    };
    let store: SignatureStore<_, u32> = SignatureStore::new(storage);

    let raw = store.candidates(&sig).unwrap();
    let keys: Vec<&str> = raw.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["far", "x", "x"]);
    assert_eq!(raw[0].dist, 1.0);

    let hits = store.search_signature(&sig).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "x");
    assert_eq!(hits[0].metadata, 1);
    assert_eq!(hits[0].dist, 0.0);
}
