//! Word indexing: cuts a signature into short fragments and encodes each as
//! one base-3 integer, usable as a term in an inverted index.
//!
//! Two signatures that share any `(position, value)` term become candidates
//! for a real distance check. Recall is best-effort; near duplicates almost
//! always share at least one of the 63 default words.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::imgshared::linspace_int;
use crate::imgstructs::MAX_WORD_WIDTH;
use crate::{Result, SignatureError};

/// Field prefix of a word term in a term-based index.
pub const WORD_FIELD_PREFIX: &str = "simple_word_";

/// One index term: the encoded word found at word slot `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordTerm {
    /// Index of the word within the signature's word vector
    pub position: usize,
    /// Base-3 encoded word
    pub value: u64,
}

impl WordTerm {
    /// Field name this term is stored under, e.g. `simple_word_7`.
    pub fn field_name(&self) -> String {
        format!("{}{}", WORD_FIELD_PREFIX, self.position)
    }
}

impl fmt::Display for WordTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}={}", WORD_FIELD_PREFIX, self.position, self.value)
    }
}

/// Start offsets of `word_number` words over a signature of `len` entries.
///
/// Non-inclusive linear space from 0 to `len`, truncated.
pub fn word_positions(len: usize, word_number: usize) -> Vec<usize> {
    linspace_int(0.0, len as f64, word_number, false)
}

/// Cut `word_number` windows of `word_width` entries out of `signature`.
///
/// Windows running past the end are zero-padded.
pub fn get_words(signature: &[i32], word_width: usize, word_number: usize) -> Result<Vec<Vec<i32>>> {
    validate_layout(signature.len(), word_width, word_number)?;

    let words = word_positions(signature.len(), word_number)
        .into_iter()
        .map(|pos| {
            let mut word = vec![0i32; word_width];
            let end = (pos + word_width).min(signature.len());
            word[..end - pos].copy_from_slice(&signature[pos..end]);
            word
        })
        .collect();

    Ok(words)
}

fn validate_layout(len: usize, word_width: usize, word_number: usize) -> Result<()> {
    if word_width == 0 || word_width > MAX_WORD_WIDTH {
        return Err(SignatureError::InvalidParameter {
            name: "word_width",
            message: format!("must be between 1 and {MAX_WORD_WIDTH}, got {word_width}"),
        });
    }
    if word_number == 0 {
        return Err(SignatureError::InvalidParameter {
            name: "word_number",
            message: "at least one word is required".into(),
        });
    }
    if word_width > len {
        return Err(SignatureError::WordWidthTooLarge {
            word_width,
            signature_len: len,
        });
    }
    if word_number > len {
        return Err(SignatureError::TooManyWords {
            word_number,
            signature_len: len,
        });
    }
    Ok(())
}

/// Collapse every entry to its sign: -1, 0 or 1.
pub fn max_contrast(words: &mut [Vec<i32>]) {
    for word in words.iter_mut() {
        for v in word.iter_mut() {
            *v = v.signum();
        }
    }
}

/// Encode each `{-1, 0, 1}` word as the base-3 numeral of `value + 1`,
/// least significant digit first.
pub fn words_to_int(words: &[Vec<i32>]) -> Vec<u64> {
    words
        .iter()
        .map(|word| {
            word.iter()
                .rev()
                .fold(0u64, |acc, &v| acc * 3 + (v + 1) as u64)
        })
        .collect()
}

/// Full pipeline: cut, quantize, encode.
pub fn make_simple_words(signature: &[i32], word_width: usize, word_number: usize) -> Result<Vec<u64>> {
    let mut words = get_words(signature, word_width, word_number)?;
    max_contrast(&mut words);
    Ok(words_to_int(&words))
}

/// Pair each word with its slot to form index terms.
pub fn words_to_terms(words: &[u64]) -> Vec<WordTerm> {
    words
        .iter()
        .enumerate()
        .map(|(position, &value)| WordTerm { position, value })
        .collect()
}

/// Largest value a word of `word_width` entries can encode to: `3^w - 1`.
pub fn max_word_value(word_width: usize) -> u64 {
    3u64.pow(word_width as u32) - 1
}
