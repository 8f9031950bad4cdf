//! Signature storage port and the store orchestrating signing, word indexing
//! and candidate re-ranking on top of it.
//!
//! A backend only has to upsert records, return every record sharing at
//! least one word term with a query, and delete by key. Distances are always
//! recomputed here, never trusted from the backend.

use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imgbuffer::PixelBuffer;
use crate::imgcomparator::normalized_distance;
use crate::imgsig::ImageSignature;
use crate::imgstructs::{Signature, StoreConfig};
use crate::imgwords::{make_simple_words, words_to_terms, WordTerm};
use crate::SignatureError;

/// Signature, word terms and metadata of one indexed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord<M> {
    /// Unique external identifier
    pub key: String,
    /// Full signature, used for re-ranking
    pub signature: Signature,
    /// One term per word slot
    pub words: Vec<WordTerm>,
    /// Caller payload, never inspected
    pub metadata: M,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord<M> {
    /// Key of the matched record
    pub key: String,
    /// Normalized distance to the query signature
    pub dist: f64,
    /// Metadata of the matched record
    pub metadata: M,
}

/// Backend holding signature records and answering term queries.
pub trait SignatureStorage<M> {
    /// Backend failure, handed to callers untouched
    type Error: std::error::Error + 'static;

    /// Insert `record`, replacing any record with the same key.
    fn upsert(&mut self, record: SignatureRecord<M>) -> Result<(), Self::Error>;

    /// Every record sharing at least one of `terms` (logical OR).
    fn query_by_any_term(&self, terms: &[WordTerm]) -> Result<Vec<SignatureRecord<M>>, Self::Error>;

    /// Remove all records stored under `key`.
    fn delete(&mut self, key: &str) -> Result<(), Self::Error>;
}

/// Errors raised by [`SignatureStore`]
#[derive(Error, Debug)]
pub enum StoreError<E>
where
    E: std::error::Error + 'static,
{
    /// Validation or signing failed before the backend was touched
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The storage backend failed
    #[error(transparent)]
    Storage(E),
}

/// Keep matches below `threshold`, then drop repeated keys.
///
/// The first occurrence of a key wins, whatever the distances of later ones:
/// with multi-orientation search the earliest orientation pass decides.
pub fn filter_matches<M>(records: Vec<MatchRecord<M>>, threshold: f64) -> Vec<MatchRecord<M>> {
    let mut seen = FxHashSet::default();
    records
        .into_iter()
        .filter(|r| r.dist < threshold)
        .filter(|r| seen.insert(r.key.clone()))
        .collect()
}

/// Signs images, indexes their words, and searches a [`SignatureStorage`].
pub struct SignatureStore<S, M>
where
    S: SignatureStorage<M>,
{
    storage: S,
    config: StoreConfig,
    generator: ImageSignature,
    _metadata: std::marker::PhantomData<fn() -> M>,
}

impl<S, M> SignatureStore<S, M>
where
    S: SignatureStorage<M>,
{
    /// Store with default word layout and signature options.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            config: StoreConfig::default(),
            generator: ImageSignature::default(),
            _metadata: std::marker::PhantomData,
        }
    }

    /// Store with custom configuration; rejects invalid signature options.
    pub fn with_config(storage: S, config: StoreConfig) -> Result<Self, SignatureError> {
        let generator = ImageSignature::new(config.signature.clone())?;
        Ok(Self {
            storage,
            config,
            generator,
            _metadata: std::marker::PhantomData,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Signature generator shared by indexing and search
    pub fn generator(&self) -> &ImageSignature {
        &self.generator
    }

    /// Borrow the backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Mutably borrow the backend
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Give the backend back
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Build the record for `signature` without storing it.
    pub fn make_record(
        &self,
        key: &str,
        signature: Signature,
        metadata: M,
    ) -> Result<SignatureRecord<M>, SignatureError> {
        let words = make_simple_words(&signature, self.config.word_width, self.config.word_number)?;
        Ok(SignatureRecord {
            key: key.to_string(),
            signature,
            words: words_to_terms(&words),
            metadata,
        })
    }

    /// Sign `image` and store it under `key`, replacing any previous record.
    ///
    /// Returns the computed signature.
    pub fn index(
        &mut self,
        key: &str,
        image: &PixelBuffer,
        metadata: M,
    ) -> Result<Signature, StoreError<S::Error>> {
        ensure_key(key)?;
        let signature = self.generator.generate(image)?;
        self.index_signature(key, signature, metadata)
    }

    /// Store a precomputed signature under `key`.
    pub fn index_signature(
        &mut self,
        key: &str,
        signature: Signature,
        metadata: M,
    ) -> Result<Signature, StoreError<S::Error>> {
        ensure_key(key)?;
        let record = self.make_record(key, signature, metadata)?;
        let signature = record.signature.clone();

        info!("Indexing `{}` with {} word terms", key, record.words.len());
        self.storage.upsert(record).map_err(StoreError::Storage)?;
        Ok(signature)
    }

    /// Records within the match threshold of `image`.
    ///
    /// With `all_orientations` the image is searched at 0°, 90°, 180° and
    /// 270° in that order; a key matched by several passes is reported once,
    /// with the distance of the earliest pass.
    pub fn search(
        &self,
        image: &PixelBuffer,
        all_orientations: bool,
    ) -> Result<Vec<MatchRecord<M>>, StoreError<S::Error>> {
        let signatures = if all_orientations {
            self.generator.generate_all_orientations(image)?
        } else {
            vec![self.generator.generate(image)?]
        };

        let mut candidates = Vec::new();
        for (pass, signature) in signatures.iter().enumerate() {
            let hits = self.candidates(signature)?;
            debug!("orientation pass {}: {} candidates", pass, hits.len());
            candidates.extend(hits);
        }

        let matches = filter_matches(candidates, self.config.match_threshold);
        info!("Search matched {} records", matches.len());
        Ok(matches)
    }

    /// Single-pass search with an already computed signature.
    ///
    /// Applies the same threshold and first-occurrence dedup as [`search`],
    /// so it can return fewer records than the storage handed back. Use
    /// [`candidates`] for the unfiltered, scored storage answer.
    ///
    /// [`search`]: SignatureStore::search
    /// [`candidates`]: SignatureStore::candidates
    pub fn search_signature(
        &self,
        signature: &Signature,
    ) -> Result<Vec<MatchRecord<M>>, StoreError<S::Error>> {
        let candidates = self.candidates(signature)?;
        Ok(filter_matches(candidates, self.config.match_threshold))
    }

    /// Every record sharing a word with `signature`, scored by true
    /// distance, in storage order. Nothing is filtered or deduplicated.
    pub fn candidates(
        &self,
        signature: &Signature,
    ) -> Result<Vec<MatchRecord<M>>, StoreError<S::Error>> {
        let words = make_simple_words(signature, self.config.word_width, self.config.word_number)?;
        let terms = words_to_terms(&words);

        let records = self
            .storage
            .query_by_any_term(&terms)
            .map_err(StoreError::Storage)?;

        Ok(records
            .into_iter()
            .map(|record| MatchRecord {
                dist: normalized_distance(signature, &record.signature),
                key: record.key,
                metadata: record.metadata,
            })
            .collect())
    }

    /// Remove every record stored under `key`.
    pub fn delete(&mut self, key: &str) -> Result<(), StoreError<S::Error>> {
        info!("Deleting `{}`", key);
        self.storage.delete(key).map_err(StoreError::Storage)
    }
}

fn ensure_key(key: &str) -> Result<(), SignatureError> {
    if key.trim().is_empty() {
        return Err(SignatureError::EmptyKey);
    }
    Ok(())
}
