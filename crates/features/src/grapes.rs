//! Grape-mention conflict detection between two wine names.
//!
//! Deliberately a smaller, stricter list than the varietal lexicon: only
//! names that reliably identify a single grape when seen in a title.

use crate::text::normalize_text;
use std::collections::BTreeSet;

const GRAPES_ONE_WORD: &[&str] = &[
    "chardonnay", "riesling", "merlot", "syrah", "shiraz", "malbec", "tempranillo", "sangiovese",
    "nebbiolo", "barbera", "gamay", "zinfandel", "grenache", "mourvedre", "pinotage", "primitivo",
    "viognier", "moscato", "muscat", "prosecco", "champagne", "cava", "verdejo", "vermentino",
    "trebbiano", "garganega", "cortese", "pecorino", "dolcetto", "aglianico", "tannat",
    "zweigelt", "torrontes", "albarino", "carmenere", "montepulciano", "negroamaro",
];

const GRAPES_TWO_WORD: &[&str] = &[
    "cabernet sauvignon",
    "pinot noir",
    "cabernet franc",
    "sauvignon blanc",
    "pinot grigio",
    "pinot gris",
    "pinot blanc",
    "chenin blanc",
    "petit verdot",
    "petite sirah",
    "gruner veltliner",
    "nero d avola",
];

/// Mentions that name the same grape.
fn same_grape(mention: &'static str) -> &'static str {
    match mention {
        "shiraz" => "syrah",
        "pinot gris" => "pinot grigio",
        other => other,
    }
}

/// Grapes named in `text`, folded so synonyms compare equal.
pub fn grape_mentions(text: &str) -> BTreeSet<&'static str> {
    let normalized = normalize_text(text);
    let padded = format!(" {normalized} ");

    let two_word = GRAPES_TWO_WORD
        .iter()
        .filter(|g| padded.contains(&format!(" {g} ")))
        .copied();
    let one_word = normalized
        .split(' ')
        .filter_map(|t| GRAPES_ONE_WORD.iter().find(|g| **g == t).copied());

    two_word.chain(one_word).map(same_grape).collect()
}

/// Both texts name a grape and they share none.
pub fn varietal_conflict(a: &str, b: &str) -> bool {
    let left = grape_mentions(a);
    let right = grape_mentions(b);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.is_disjoint(&right)
}
