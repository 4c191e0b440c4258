use crate::pool::{CandidatePool, IndexedCandidate};
use crate::MatchConfig;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use vinolink_features::{normalize_text, significant_tokens, varietal_conflict, word_tokens};
use vinolink_model::ExternalRatingCandidate;

/// A catalog entry prepared for matching.
#[derive(Debug, Clone)]
pub struct MatchTarget {
    pub name: String,
    pub name_normalized: String,
    /// `None` when the producer is unknown
    pub producer_normalized: Option<String>,
    pub tokens: BTreeSet<String>,
}

impl MatchTarget {
    /// Tokens come from `producer + name`, or from the name alone when the
    /// producer is unknown so the sentinel words never count.
    pub fn new(name: &str, producer: Option<&str>) -> Self {
        let producer = producer.map(str::trim).filter(|p| !p.is_empty());
        let raw = match producer {
            Some(producer) => format!("{} {}", producer, name),
            None => name.to_string(),
        };
        Self {
            name: name.to_string(),
            name_normalized: normalize_text(name),
            producer_normalized: producer.map(normalize_text).filter(|p| !p.is_empty()),
            tokens: significant_tokens(&raw),
        }
    }

    pub fn producer_known(&self) -> bool {
        self.producer_normalized.is_some()
    }

    /// Index pre-filter: short targets need one shared token, longer ones two.
    pub fn min_shared_tokens(&self) -> usize {
        if self.tokens.len() <= 2 {
            1
        } else {
            2
        }
    }
}

/// How the catalog producer relates to the candidate winery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerAgreement {
    Exact,
    Partial,
    SharedWord,
    Mismatch,
    /// Producer or winery unknown
    NotCompared,
}

/// Additive components of a match score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: f32,
    pub producer_agreement: ProducerAgreement,
    pub producer_adjustment: f32,
    pub containment_bonus: f32,
    /// Sum of the above; not clamped, may exceed 1
    pub total: f32,
}

/// Jaccard similarity of two token sets, 0 when either is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    let union = a.len() + b.len() - overlap;
    if union == 0 {
        0.0
    } else {
        overlap as f32 / union as f32
    }
}

/// Score one candidate against a target. `None` when the two names mention
/// different grapes.
pub fn score_candidate(
    target: &MatchTarget,
    candidate: &IndexedCandidate,
    config: &MatchConfig,
) -> Option<ScoreBreakdown> {
    if varietal_conflict(&target.name, &candidate.candidate.full_name) {
        return None;
    }

    let base_score = jaccard(&target.tokens, &candidate.tokens);

    let producer_agreement = match target.producer_normalized.as_deref() {
        Some(producer) if !candidate.winery_normalized.is_empty() => {
            producer_agreement(producer, &candidate.winery_normalized)
        }
        _ => ProducerAgreement::NotCompared,
    };
    let producer_adjustment = match producer_agreement {
        ProducerAgreement::Exact => config.exact_producer_bonus,
        ProducerAgreement::Partial => config.partial_producer_bonus,
        ProducerAgreement::Mismatch => -config.producer_mismatch_penalty,
        ProducerAgreement::SharedWord | ProducerAgreement::NotCompared => 0.0,
    };

    let ours = target.name_normalized.as_str();
    let theirs = candidate.full_name_normalized.as_str();
    let contained =
        !ours.is_empty() && !theirs.is_empty() && (ours.contains(theirs) || theirs.contains(ours));
    let containment_bonus = if contained { config.containment_bonus } else { 0.0 };

    Some(ScoreBreakdown {
        base_score,
        producer_agreement,
        producer_adjustment,
        containment_bonus,
        total: base_score + producer_adjustment + containment_bonus,
    })
}

fn producer_agreement(producer: &str, winery: &str) -> ProducerAgreement {
    if producer == winery {
        return ProducerAgreement::Exact;
    }
    if producer.contains(winery) || winery.contains(producer) {
        return ProducerAgreement::Partial;
    }
    let producer_words = word_tokens(producer);
    let winery_words = word_tokens(winery);
    if producer_words.is_disjoint(&winery_words) {
        ProducerAgreement::Mismatch
    } else {
        ProducerAgreement::SharedWord
    }
}

/// The winning candidate for a target.
#[derive(Debug, Clone, Copy)]
pub struct CandidateMatch<'p> {
    pub candidate: &'p ExternalRatingCandidate,
    pub score: ScoreBreakdown,
}

impl CandidateMatch<'_> {
    pub fn total(&self) -> f32 {
        self.score.total
    }
}

/// Outcome of matching one target, with the reason when nothing matched.
#[derive(Debug, Clone, Copy)]
pub enum MatchDecision<'p> {
    /// The index returned nothing for the target's tokens.
    NoCandidates,
    /// Every indexed candidate was vetoed by a grape conflict.
    AllVetoed { vetoed: usize },
    /// The best candidate did not clear the floor.
    BelowFloor { best: CandidateMatch<'p>, floor: f32 },
    Matched(CandidateMatch<'p>),
}

impl<'p> MatchDecision<'p> {
    pub fn accepted(self) -> Option<CandidateMatch<'p>> {
        match self {
            Self::Matched(found) => Some(found),
            _ => None,
        }
    }
}

/// Higher total wins; equal totals go to the better-reviewed candidate, then
/// to the lower source id.
fn outranks(a: &CandidateMatch<'_>, b: &CandidateMatch<'_>) -> bool {
    match a.score.total.partial_cmp(&b.score.total) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) | None => false,
        Some(Ordering::Equal) => match a.candidate.rating_count.cmp(&b.candidate.rating_count) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.candidate.wine_id < b.candidate.wine_id,
        },
    }
}

/// Match a target against a pool and say why when nothing is accepted.
pub fn evaluate<'p>(
    target: &MatchTarget,
    pool: &'p CandidatePool,
    config: &MatchConfig,
) -> MatchDecision<'p> {
    let positions = pool.candidates_sharing(&target.tokens, target.min_shared_tokens());
    if positions.is_empty() {
        return MatchDecision::NoCandidates;
    }

    let mut best: Option<CandidateMatch<'p>> = None;
    let mut vetoed = 0;
    for indexed in positions.into_iter().filter_map(|p| pool.get(p)) {
        let Some(score) = score_candidate(target, indexed, config) else {
            vetoed += 1;
            continue;
        };
        let found = CandidateMatch {
            candidate: &indexed.candidate,
            score,
        };
        if best.as_ref().map_or(true, |current| outranks(&found, current)) {
            best = Some(found);
        }
    }

    let Some(best) = best else {
        return MatchDecision::AllVetoed { vetoed };
    };

    let floor = config.score_floor(target.producer_known());
    if best.score.total < floor {
        MatchDecision::BelowFloor { best, floor }
    } else {
        MatchDecision::Matched(best)
    }
}

/// Best candidate for a catalog name/producer, or `None` when no candidate
/// clears the acceptance floor.
pub fn match_one<'p>(
    name: &str,
    producer: Option<&str>,
    pool: &'p CandidatePool,
    config: &MatchConfig,
) -> Option<CandidateMatch<'p>> {
    evaluate(&MatchTarget::new(name, producer), pool, config).accepted()
}
