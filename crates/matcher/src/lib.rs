//! Cross-source wine matching.
//!
//! Resolves a retailer catalog entry against a pool of ratings-source
//! candidates:
//! - `CandidatePool`: eligible candidates plus an inverted token index
//! - `score_candidate` / `match_one`: Jaccard scoring with producer and
//!   containment adjustments and a grape-conflict veto
//! - `ClaimArbiter`: run-scoped 1:1 enforcement between catalog entries and
//!   candidates
//! - `WineryDirectory`: producer -> winery lookup for the expansion pass

mod arbiter;
mod pool;
mod score;
mod winery;

pub use arbiter::{Claim, ClaimArbiter, ClaimOutcome};
pub use pool::{CandidatePool, IndexedCandidate};
pub use score::{
    evaluate, jaccard, match_one, score_candidate, CandidateMatch, MatchDecision, MatchTarget,
    ProducerAgreement, ScoreBreakdown,
};
pub use winery::{WineryDirectory, WineryResolution};

/// Tuned constants of the matcher.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Normalized producer equals the candidate winery
    pub exact_producer_bonus: f32,
    /// One of producer / winery contains the other
    pub partial_producer_bonus: f32,
    /// Known producer shares no word with the winery
    pub producer_mismatch_penalty: f32,
    /// One normalized full name contains the other
    pub containment_bonus: f32,
    /// Acceptance floor when the catalog producer is known
    pub min_score_known_producer: f32,
    /// Acceptance floor for name-only matching
    pub min_score_unknown_producer: f32,
    /// Minimum persisted confidence that may overwrite the direct URL
    pub link_confidence_floor: f32,
    /// Persisted confidence range
    pub min_confidence: f32,
    pub max_confidence: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_producer_bonus: 0.20,
            partial_producer_bonus: 0.12,
            producer_mismatch_penalty: 0.10,
            containment_bonus: 0.10,
            min_score_known_producer: 0.45,
            min_score_unknown_producer: 0.50,
            link_confidence_floor: 0.55,
            min_confidence: 0.55,
            max_confidence: 0.95,
        }
    }
}

impl MatchConfig {
    pub fn score_floor(&self, producer_known: bool) -> f32 {
        if producer_known {
            self.min_score_known_producer
        } else {
            self.min_score_unknown_producer
        }
    }

    /// Confidence persisted with a signal. Never 0 or 1: a match is always
    /// an estimate.
    pub fn confidence(&self, total: f32) -> f32 {
        total.clamp(self.min_confidence, self.max_confidence)
    }

    pub fn is_link_worthy(&self, confidence: f32) -> bool {
        confidence >= self.link_confidence_floor
    }
}
