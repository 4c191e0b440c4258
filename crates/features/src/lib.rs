//! Feature extraction for wine entity resolution.
//!
//! Provides pure functions used by ingestion and matching:
//! - Text normalization and significant-token extraction
//! - Grape varietal extraction against a curated lexicon
//! - Producer extraction as an ordered strategy chain
//! - Grape-mention conflict detection between two wine names

mod grapes;
mod producer;
mod text;
mod varietal;

pub use grapes::{grape_mentions, varietal_conflict};
pub use producer::{extract_producer, extract_producer_with, ProducerStrategy, PRODUCER_STRATEGIES};
pub use text::{
    fold_diacritics, is_stop_word, is_vintage_year, normalize_text, significant_tokens,
    word_tokens, STOP_WORDS,
};
pub use varietal::{
    canonical_varietal, extract_varietal, is_canonical_varietal, varietal_patterns,
    VarietalPattern, RAW_VARIETALS,
};
