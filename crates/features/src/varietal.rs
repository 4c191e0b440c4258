//! Grape varietal lexicon and extraction.

use crate::text::{fold_pattern, FoldedText};
use std::sync::LazyLock;

/// Every grape name (and sparkling designation) the extractor recognises,
/// including spelling variants. Aliases fold to a canonical display name
/// through `CANONICAL_ALIASES`.
pub const RAW_VARIETALS: &[&str] = &[
    // Red, multi-word
    "Cabernet Sauvignon",
    "Pinot Noir",
    "Cabernet Franc",
    "Petit Verdot",
    "Petite Sirah",
    "Pinot Meunier",
    "Touriga Nacional",
    "Nero d'Avola",
    // Red
    "Merlot",
    "Syrah",
    "Shiraz",
    "Sangiovese",
    "Tempranillo",
    "Grenache",
    "Garnacha",
    "Malbec",
    "Zinfandel",
    "Nebbiolo",
    "Barbera",
    "Mourvèdre",
    "Monastrell",
    "Carménère",
    "Pinotage",
    "Gamay",
    "Primitivo",
    "Dolcetto",
    "Montepulciano",
    "Aglianico",
    "Corvina",
    "Tannat",
    "Bonarda",
    "Zweigelt",
    "Blaufränkisch",
    "Mencía",
    // White, multi-word
    "Sauvignon Blanc",
    "Pinot Grigio",
    "Pinot Gris",
    "Pinot Blanc",
    "Chenin Blanc",
    "Grüner Veltliner",
    "Gruner Veltliner",
    // White
    "Chardonnay",
    "Riesling",
    "Viognier",
    "Gewürztraminer",
    "Gewurztraminer",
    "Albariño",
    "Albarino",
    "Torrontés",
    "Torrontes",
    "Muscat",
    "Moscato",
    "Moscatel",
    "Sémillon",
    "Semillon",
    "Marsanne",
    "Roussanne",
    "Verdejo",
    "Vermentino",
    "Trebbiano",
    "Garganega",
    "Fiano",
    "Falanghina",
    "Cortese",
    "Pecorino",
    "Soave",
    // Sparkling designations
    "Prosecco",
    "Champagne",
    "Cava",
    "Crémant",
    "Cremant",
    // Other designations
    "Meritage",
    "Vidal",
    "Baco Noir",
];

/// Lowercase variant -> preferred display name.
const CANONICAL_ALIASES: &[(&str, &str)] = &[
    ("pinot gris", "Pinot Grigio"),
    ("garnacha", "Grenache"),
    ("monastrell", "Mourvèdre"),
    ("gruner veltliner", "Grüner Veltliner"),
    ("gewurztraminer", "Gewürztraminer"),
    ("albarino", "Albariño"),
    ("torrontes", "Torrontés"),
    ("semillon", "Sémillon"),
    ("cremant", "Crémant"),
];

/// One lexicon entry, pre-folded for matching.
#[derive(Debug, Clone)]
pub struct VarietalPattern {
    pub raw: &'static str,
    pub canonical: &'static str,
    folded: Vec<char>,
}

impl VarietalPattern {
    pub(crate) fn folded(&self) -> &[char] {
        &self.folded
    }
}

/// Lexicon sorted longest-first so "Sauvignon Blanc" is tried before any
/// shorter name it contains. The sort is stable, so equal lengths keep
/// lexicon order.
static PATTERNS: LazyLock<Vec<VarietalPattern>> = LazyLock::new(|| {
    let mut patterns: Vec<VarietalPattern> = RAW_VARIETALS
        .iter()
        .map(|&raw| VarietalPattern {
            raw,
            canonical: canonical_varietal(raw),
            folded: fold_pattern(raw),
        })
        .collect();
    patterns.sort_by(|a, b| b.folded.len().cmp(&a.folded.len()));
    patterns
});

pub fn varietal_patterns() -> &'static [VarietalPattern] {
    &PATTERNS
}

/// Fold a lexicon spelling to its display name ("Garnacha" -> "Grenache").
pub fn canonical_varietal(raw: &'static str) -> &'static str {
    let lower = raw.to_lowercase();
    CANONICAL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

/// Whether `label` is a display name `extract_varietal` can produce.
pub fn is_canonical_varietal(label: &str) -> bool {
    PATTERNS.iter().any(|p| p.canonical == label)
}

/// Extract a canonical grape name from a wine name, falling back to its
/// description. `None` means no lexicon grape was found ("Blend").
///
/// Matching is case- and diacritic-insensitive and word-bounded. When a
/// text names several grapes, the longest lexicon entry wins, not the
/// earliest position.
pub fn extract_varietal(name: &str, description: Option<&str>) -> Option<&'static str> {
    find_in(name).or_else(|| description.and_then(find_in))
}

fn find_in(text: &str) -> Option<&'static str> {
    if text.trim().is_empty() {
        return None;
    }
    let folded = FoldedText::new(text);
    PATTERNS
        .iter()
        .find(|p| folded.contains_word(&p.folded))
        .map(|p| p.canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_single_word_grape() {
        assert_eq!(extract_varietal("Gato Negro Chardonnay", None), Some("Chardonnay"));
        assert_eq!(
            extract_varietal("Mountadam High Eden Estate Chardonnay 2023", None),
            Some("Chardonnay")
        );
        assert_eq!(extract_varietal("Catena Malbec Mendoza 2022", None), Some("Malbec"));
        assert_eq!(extract_varietal("Penfolds Bin 28 Kalimna Shiraz", None), Some("Shiraz"));
        assert_eq!(extract_varietal("Inniskillin Vidal Icewine 2022", None), Some("Vidal"));
    }

    #[test]
    fn test_multi_word_preferred_over_contained_word() {
        assert_eq!(
            extract_varietal("Robert Mondavi Cabernet Sauvignon 2021", None),
            Some("Cabernet Sauvignon")
        );
        assert_eq!(extract_varietal("Kim Crawford Sauvignon Blanc", None), Some("Sauvignon Blanc"));
        assert_eq!(extract_varietal("Henry of Pelham Baco Noir VQA", None), Some("Baco Noir"));
    }

    #[test]
    fn test_aliases_fold_to_canonical() {
        assert_eq!(extract_varietal("Trimbach Pinot Gris", None), Some("Pinot Grigio"));
        assert_eq!(extract_varietal("Bodegas Borsao Garnacha", None), Some("Grenache"));
        assert_eq!(extract_varietal("Martín Códax Albarino", None), Some("Albariño"));
    }

    #[test]
    fn test_accent_insensitive() {
        assert_eq!(
            extract_varietal("Grüner Veltliner Kamptal 2023", None),
            Some("Grüner Veltliner")
        );
        assert_eq!(
            extract_varietal("gruner veltliner kamptal 2023", None),
            Some("Grüner Veltliner")
        );
        assert_eq!(extract_varietal("Concha y Toro Carmenere", None), Some("Carménère"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(extract_varietal("domaine CHARDONNAY reserve", None), Some("Chardonnay"));
    }

    #[test]
    fn test_description_fallback() {
        assert_eq!(
            extract_varietal(
                "Louis Jadot Chablis",
                Some("A classic Chardonnay from the Chablis appellation in Burgundy.")
            ),
            Some("Chardonnay")
        );
        assert_eq!(
            extract_varietal(
                "Pio Cesare Barolo 2019",
                Some("A full-bodied Nebbiolo from the Langhe hills.")
            ),
            Some("Nebbiolo")
        );
    }

    #[test]
    fn test_name_wins_over_description() {
        assert_eq!(
            extract_varietal("Beringer Merlot 2021", Some("A Chardonnay-like richness in a red.")),
            Some("Merlot")
        );
    }

    #[test]
    fn test_longest_match_beats_earliest_position() {
        // Merlot appears first, but the longer lexicon entry is tested first.
        assert_eq!(
            extract_varietal("Merlot and Cabernet Sauvignon", None),
            Some("Cabernet Sauvignon")
        );
    }

    #[test]
    fn test_blend_when_nothing_found() {
        assert_eq!(extract_varietal("Mystery Cellar Red Blend 2022", None), None);
        assert_eq!(extract_varietal("Casillero del Diablo Reserva", None), None);
        assert_eq!(extract_varietal("", None), None);
        assert_eq!(extract_varietal("", Some("")), None);
    }

    #[test]
    fn test_canonical_membership() {
        assert!(is_canonical_varietal("Pinot Grigio"));
        assert!(is_canonical_varietal("Grüner Veltliner"));
        assert!(!is_canonical_varietal("Pinot Gris"));
        assert!(!is_canonical_varietal("Blend"));
    }

    #[test]
    fn test_patterns_sorted_longest_first() {
        let lengths: Vec<usize> = varietal_patterns().iter().map(|p| p.folded().len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }
}
