use std::collections::{BTreeSet, HashMap};
use vinolink_features::{normalize_text, significant_tokens};
use vinolink_model::ExternalRatingCandidate;

/// A candidate with the derived text it is scored on.
#[derive(Debug, Clone)]
pub struct IndexedCandidate {
    pub candidate: ExternalRatingCandidate,
    pub tokens: BTreeSet<String>,
    pub winery_normalized: String,
    pub full_name_normalized: String,
}

impl IndexedCandidate {
    pub fn new(candidate: ExternalRatingCandidate) -> Self {
        let tokens =
            significant_tokens(&format!("{} {}", candidate.winery_name, candidate.full_name));
        let winery_normalized = normalize_text(&candidate.winery_name);
        let full_name_normalized = normalize_text(&candidate.full_name);
        Self {
            candidate,
            tokens,
            winery_normalized,
            full_name_normalized,
        }
    }
}

/// Eligible candidates of one crawl (or one winery listing) with an
/// inverted index from significant token to candidate positions.
#[derive(Debug, Default)]
pub struct CandidatePool {
    entries: Vec<IndexedCandidate>,
    index: HashMap<String, Vec<usize>>,
}

impl CandidatePool {
    /// Build a pool, dropping candidates with no rating signal.
    pub fn new(candidates: impl IntoIterator<Item = ExternalRatingCandidate>) -> Self {
        let mut pool = Self::default();
        for candidate in candidates {
            pool.push(candidate);
        }
        pool
    }

    /// Add one candidate. Returns false when it is ineligible.
    pub fn push(&mut self, candidate: ExternalRatingCandidate) -> bool {
        if !candidate.is_eligible() {
            return false;
        }
        let position = self.entries.len();
        let indexed = IndexedCandidate::new(candidate);
        for token in &indexed.tokens {
            self.index.entry(token.clone()).or_default().push(position);
        }
        self.entries.push(indexed);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&IndexedCandidate> {
        self.entries.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedCandidate> {
        self.entries.iter()
    }

    /// Positions of candidates sharing at least `min_shared` tokens with
    /// `tokens`, ascending.
    pub fn candidates_sharing(&self, tokens: &BTreeSet<String>, min_shared: usize) -> Vec<usize> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for token in tokens {
            if let Some(positions) = self.index.get(token) {
                for &position in positions {
                    *counts.entry(position).or_insert(0) += 1;
                }
            }
        }

        let mut shared: Vec<usize> = counts
            .into_iter()
            .filter(|&(_, count)| count >= min_shared)
            .map(|(position, _)| position)
            .collect();
        shared.sort_unstable();
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_ineligible_candidates_are_dropped() {
        let pool = CandidatePool::new(vec![
            ExternalRatingCandidate::new(1, "Gato Negro", "Chardonnay", 4.1, 120),
            ExternalRatingCandidate::new(2, "Gato Negro", "Merlot", 0.0, 50),
            ExternalRatingCandidate::new(3, "Gato Negro", "Rose", 3.9, 0),
        ]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(0).unwrap().candidate.wine_id, 1);
    }

    #[test]
    fn test_candidate_tokens_combine_winery_and_full_name() {
        let pool = CandidatePool::new(vec![ExternalRatingCandidate::new(
            1,
            "Henry of Pelham",
            "Baco Noir 2021",
            4.0,
            300,
        )]);
        let indexed = pool.get(0).unwrap();
        assert_eq!(indexed.tokens, tokens(&["baco", "henry", "noir", "of", "pelham"]));
        assert_eq!(indexed.full_name_normalized, "henry of pelham baco noir");
    }

    #[test]
    fn test_candidates_sharing_respects_minimum() {
        let pool = CandidatePool::new(vec![
            ExternalRatingCandidate::new(1, "Cloudy Bay", "Sauvignon Blanc", 4.2, 900),
            ExternalRatingCandidate::new(2, "Kim Crawford", "Sauvignon Blanc", 3.9, 1500),
            ExternalRatingCandidate::new(3, "Cloudy Bay", "Pinot Noir", 4.1, 400),
        ]);

        let target = tokens(&["cloudy", "bay", "sauvignon", "blanc"]);
        assert_eq!(pool.candidates_sharing(&target, 1), vec![0, 1, 2]);
        assert_eq!(pool.candidates_sharing(&target, 3), vec![0]);
        assert!(pool.candidates_sharing(&tokens(&["malbec"]), 1).is_empty());
    }
}
