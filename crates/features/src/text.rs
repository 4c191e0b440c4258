//! Text normalization shared by extraction and matching.

use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Generic wine-label words that would dominate token overlap without
/// saying anything about which wine it is.
pub const STOP_WORDS: &[&str] = &[
    "wine", "wines", "estate", "estates", "winery", "vineyards", "vineyard", "cellars", "cellar",
    "reserve", "reserva", "riserva", "cuvee", "gran", "grande", "grand", "special", "limited",
    "edition", "classic", "selection", "old", "vines", "single", "barrel", "organic", "natural",
    "dry", "off", "sweet", "semi", "brut", "extra", "vintage", "vqa", "doc", "docg", "igt", "aoc",
    "ava", "kp", "do", "dop", "de", "di", "du", "des", "del", "della", "le", "la", "les", "los",
    "el", "il", "the", "and", "or", "bin",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Remove combining marks after canonical decomposition ("Grüner" -> "Gruner").
pub fn fold_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Four-digit 19xx/20xx token.
pub fn is_vintage_year(token: &str) -> bool {
    token.len() == 4
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

/// Normalize text for comparison: lowercase, fold diacritics, drop vintage
/// years and punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let folded = fold_diacritics(&text.to_lowercase());
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| !is_vintage_year(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bag of identity-bearing words: normalized, longer than one character,
/// not a stop word.
pub fn significant_tokens(text: &str) -> BTreeSet<String> {
    normalize_text(text)
        .split(' ')
        .filter(|t| t.len() > 1 && !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

/// Words of an already-normalized string, longer than one character.
pub fn word_tokens(normalized: &str) -> BTreeSet<&str> {
    normalized.split(' ').filter(|t| t.len() > 1).collect()
}

/// Lowercased, diacritic-folded characters of a pattern.
pub(crate) fn fold_pattern(text: &str) -> Vec<char> {
    text.chars().flat_map(fold_char).collect()
}

fn fold_char(c: char) -> Vec<char> {
    let lower: String = c.to_lowercase().collect();
    lower.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Folded view of a text that remembers where each folded character came
/// from, so a match can be mapped back onto the original string.
pub(crate) struct FoldedText {
    chars: Vec<char>,
    offsets: Vec<usize>,
}

impl FoldedText {
    pub(crate) fn new(text: &str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut offsets = Vec::with_capacity(text.len());
        for (offset, ch) in text.char_indices() {
            for folded in fold_char(ch) {
                chars.push(folded);
                offsets.push(offset);
            }
        }
        Self { chars, offsets }
    }

    /// Byte offset (in the original text) of the first occurrence of
    /// `needle` that sits on word boundaries at both ends.
    pub(crate) fn find_word(&self, needle: &[char]) -> Option<usize> {
        self.find_word_from(needle, 0)
    }

    /// `find_word`, ignoring matches that start before folded position `from`.
    pub(crate) fn find_word_from(&self, needle: &[char], from: usize) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.chars.len() {
            return None;
        }

        (from..=self.chars.len() - needle.len())
            .find(|&start| {
                let end = start + needle.len();
                self.chars[start..end] == *needle
                    && (start == 0 || !self.chars[start - 1].is_alphanumeric())
                    && (end == self.chars.len() || !self.chars[end].is_alphanumeric())
            })
            .map(|start| self.offsets[start])
    }

    pub(crate) fn contains_word(&self, needle: &[char]) -> bool {
        self.find_word(needle).is_some()
    }
}
