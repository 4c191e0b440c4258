//! Producer (brand) inference from a product name.
//!
//! The retailer feed almost never carries a producer, so the producer is
//! read off the name: whatever precedes the grape is taken as the brand.
//! The fallbacks are an explicit ordered chain, `PRODUCER_STRATEGIES`.

use crate::text::{fold_pattern, is_vintage_year, FoldedText};
use crate::varietal::{varietal_patterns, RAW_VARIETALS};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use vinolink_model::parse_varietal;

/// Label terms that sit between a producer and the grape. Stripped when
/// they trail the producer portion.
const TRAILING_TERMS: &[&str] = &[
    "gran reserva",
    "grand cru",
    "premier cru",
    "riserva",
    "reserva",
    "reserve",
    "crianza",
    "roble",
    "superiore",
    "classico",
    "estate",
    "winery",
    "vineyard",
    "vineyards",
    "cellar",
    "cellars",
    "wine",
    "wines",
];

/// Retailer suffixes (kosher markers, appellation codes).
const LABEL_SUFFIXES: &[&str] = &[
    "KP", "KPM", "VQA", "DOC", "DOCG", "IGT", "IGP", "AOC", "AOP", "DO",
];

/// Grape spellings used to anchor the producer split, raw and canonical,
/// longest first.
static ANCHORS: LazyLock<Vec<Vec<char>>> = LazyLock::new(|| {
    let spellings: BTreeSet<Vec<char>> = RAW_VARIETALS
        .iter()
        .map(|raw| fold_pattern(raw))
        .chain(varietal_patterns().iter().map(|p| fold_pattern(p.canonical)))
        .collect();
    let mut anchors: Vec<Vec<char>> = spellings.into_iter().collect();
    anchors.sort_by(|a, b| b.len().cmp(&a.len()));
    anchors
});

/// One stage of the producer fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerStrategy {
    /// Split the name at the already-extracted varietal.
    SuppliedVarietal,
    /// Split the name at any lexicon grape, longest first.
    LexiconScan,
    /// Guess the first one or two words. Only when a varietal is known and
    /// the name has at least three words.
    LeadingWords,
}

/// The default chain, tried in order until one stage yields a producer.
pub const PRODUCER_STRATEGIES: [ProducerStrategy; 3] = [
    ProducerStrategy::SuppliedVarietal,
    ProducerStrategy::LexiconScan,
    ProducerStrategy::LeadingWords,
];

impl ProducerStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SuppliedVarietal => "supplied_varietal",
            Self::LexiconScan => "lexicon_scan",
            Self::LeadingWords => "leading_words",
        }
    }

    /// Run this stage alone. `varietal` is `None` for blends.
    pub fn apply(&self, name: &str, varietal: Option<&str>) -> Option<String> {
        match self {
            Self::SuppliedVarietal => {
                let varietal = varietal?;
                let folded = FoldedText::new(name);
                split_before(name, &folded, &fold_pattern(varietal))
            }
            Self::LexiconScan => {
                let folded = FoldedText::new(name);
                ANCHORS
                    .iter()
                    .find_map(|anchor| split_before(name, &folded, anchor))
            }
            Self::LeadingWords => varietal.and_then(|_| leading_words(name)),
        }
    }
}

/// Infer the producer of a wine from its name. `None` is the explicit
/// "Unknown Producer" outcome: without a grape anchor and without a known
/// varietal, no guess is made.
pub fn extract_producer(name: &str, varietal: Option<&str>) -> Option<String> {
    extract_producer_with(&PRODUCER_STRATEGIES, name, varietal)
}

/// Same as `extract_producer` with a caller-supplied chain.
pub fn extract_producer_with(
    chain: &[ProducerStrategy],
    name: &str,
    varietal: Option<&str>,
) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let varietal = varietal.and_then(parse_varietal);

    chain.iter().find_map(|strategy| {
        strategy
            .apply(name, varietal.as_deref())
            .filter(|producer| !is_grape_only(producer))
    })
}

/// Cleaned text before the first word-bounded occurrence of `anchor` that
/// does not open the name.
fn split_before(name: &str, folded: &FoldedText, anchor: &[char]) -> Option<String> {
    let offset = folded.find_word_from(anchor, 1)?;
    let producer = clean_to_fixed_point(&name[..offset]);
    (producer.chars().count() >= 2).then_some(producer)
}

/// A grape name on its own is never a producer.
fn is_grape_only(producer: &str) -> bool {
    let folded = fold_pattern(producer);
    ANCHORS.iter().any(|anchor| *anchor == folded)
}

fn leading_words(name: &str) -> Option<String> {
    let cleaned = clean_to_fixed_point(name);
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    // One or two words is most likely the wine name alone.
    if words.len() <= 2 {
        return None;
    }

    let take = if words.len() >= 4 { 2 } else { 1 };
    let candidate = words[..take].join(" ");
    (candidate.chars().count() >= 2).then_some(candidate)
}

/// Apply `clean_once` until nothing changes, which keeps extraction
/// idempotent when several label terms are stacked.
fn clean_to_fixed_point(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let bare = |t: &str| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string();

    let mut words: Vec<&str> = raw
        .split_whitespace()
        .enumerate()
        .filter(|&(i, w)| {
            let token = bare(w);
            !is_vintage_year(&token)
                && !(i > 0 && LABEL_SUFFIXES.iter().any(|s| s.eq_ignore_ascii_case(&token)))
        })
        .map(|(_, w)| w)
        .collect();

    if let Some(len) = trailing_term_len(&words) {
        words.truncate(words.len() - len);
    }

    words
        .join(" ")
        .trim_end_matches(|c: char| c == '-' || c == ',' || c.is_whitespace())
        .to_string()
}

/// Number of trailing words forming a label term, longest term first.
fn trailing_term_len(words: &[&str]) -> Option<usize> {
    TRAILING_TERMS.iter().find_map(|term| {
        let parts: Vec<&str> = term.split(' ').collect();
        if parts.len() > words.len() {
            return None;
        }
        let tail = &words[words.len() - parts.len()..];
        tail.iter()
            .zip(&parts)
            .all(|(w, p)| w.trim_end_matches(',').eq_ignore_ascii_case(p))
            .then_some(parts.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(name: &str, varietal: Option<&str>) -> Option<String> {
        extract_producer(name, varietal)
    }

    #[test]
    fn test_producer_before_single_word_varietal() {
        assert_eq!(producer("Alamos Chardonnay", Some("Chardonnay")).as_deref(), Some("Alamos"));
        assert_eq!(producer("13th Street Gamay", Some("Gamay")).as_deref(), Some("13th Street"));
    }

    #[test]
    fn test_producer_before_multi_word_varietal() {
        assert_eq!(
            producer("Cloudy Bay Sauvignon Blanc", Some("Sauvignon Blanc")).as_deref(),
            Some("Cloudy Bay")
        );
        assert_eq!(
            producer("Henry of Pelham Baco Noir 2021", Some("Baco Noir")).as_deref(),
            Some("Henry of Pelham")
        );
    }

    #[test]
    fn test_varietal_spelling_differs_from_name() {
        // Folding bridges the accent.
        assert_eq!(
            producer("Pierre Sparr Gewurztraminer", Some("Gewürztraminer")).as_deref(),
            Some("Pierre Sparr")
        );
        // Canonical "Pinot Grigio" is not in the name, the raw spelling is.
        assert_eq!(
            producer("Trimbach Pinot Gris", Some("Pinot Grigio")).as_deref(),
            Some("Trimbach")
        );
    }

    #[test]
    fn test_strips_label_noise() {
        assert_eq!(producer("Tawse Estate Chardonnay", Some("Chardonnay")).as_deref(), Some("Tawse"));
        assert_eq!(
            producer("Some Producer 2021 Merlot", Some("Merlot")).as_deref(),
            Some("Some Producer")
        );
        assert_eq!(producer("Galil Mountain Syrah KP", Some("Syrah")).as_deref(), Some("Galil Mountain"));
        assert_eq!(
            producer("Emiliana Novas Gran Reserva Cabernet Sauvignon 2023", Some("Cabernet Sauvignon"))
                .as_deref(),
            Some("Emiliana Novas")
        );
        assert_eq!(
            producer("Alianca Bairrada Reserva Merlot", Some("Merlot")).as_deref(),
            Some("Alianca Bairrada")
        );
        assert_eq!(
            producer("Niagara Estate Winery VQA Riesling", Some("Riesling")).as_deref(),
            Some("Niagara")
        );
    }

    #[test]
    fn test_keeps_apostrophes_and_numbers() {
        assert_eq!(
            producer("Alvi's Drift 221 Chenin Blanc 2024", Some("Chenin Blanc")).as_deref(),
            Some("Alvi's Drift 221")
        );
    }

    #[test]
    fn test_leading_words_when_varietal_known_but_absent() {
        assert_eq!(
            producer("Nozzole Riserva Chianti Classico 2021", Some("Sangiovese")).as_deref(),
            Some("Nozzole")
        );
        assert_eq!(
            producer("Château Margaux Grand Vin 2015", Some("Merlot")).as_deref(),
            Some("Château Margaux")
        );
        assert_eq!(producer("Barolo Riserva", Some("Nebbiolo")), None);
    }

    #[test]
    fn test_refuses_to_guess_without_anchor() {
        assert_eq!(producer("Château Margaux Grand Vin 2015", None), None);
        assert_eq!(producer("Some Random Wine", Some("Blend")), None);
        assert_eq!(producer("", Some("Chardonnay")), None);
        assert_eq!(producer("   ", None), None);
    }

    #[test]
    fn test_grape_at_start_is_not_a_producer() {
        assert_eq!(producer("Chardonnay", Some("Chardonnay")), None);
    }

    #[test]
    fn test_name_opening_with_its_grape() {
        assert_eq!(producer("Merlot Hills Merlot", Some("Merlot")).as_deref(), Some("Merlot Hills"));
        assert_eq!(producer("Merlot Hills Merlot", None).as_deref(), Some("Merlot Hills"));
        assert_eq!(producer("Merlot Reserve Merlot", Some("Merlot")), None);
        assert_eq!(producer("Merlot Merlot", Some("Merlot")), None);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let cases = [
            ("Henry of Pelham Estate Winery Baco Noir 2021", "Baco Noir"),
            ("Emiliana Novas Gran Reserva Cabernet Sauvignon 2023", "Cabernet Sauvignon"),
            ("Nozzole Riserva Chianti Classico 2021", "Sangiovese"),
            ("Château Margaux Grand Vin 2015", "Merlot"),
            ("Galil Mountain Syrah KP", "Syrah"),
            ("Merlot Hills Merlot", "Merlot"),
        ];
        for (name, varietal) in cases {
            let first = producer(name, Some(varietal)).unwrap();
            let again = producer(&format!("{} {}", first, varietal), Some(varietal)).unwrap();
            assert_eq!(first, again, "not idempotent for {name}");
        }
    }

    #[test]
    fn test_single_stage_is_testable() {
        assert_eq!(
            ProducerStrategy::LexiconScan.apply("Gato Negro Chardonnay", None).as_deref(),
            Some("Gato Negro")
        );
        assert_eq!(ProducerStrategy::LeadingWords.apply("Gato Negro Chardonnay", None), None);
        assert_eq!(
            extract_producer_with(&[ProducerStrategy::LeadingWords], "Nozzole Riserva Chianti", Some("Sangiovese"))
                .as_deref(),
            Some("Nozzole")
        );
    }
}
