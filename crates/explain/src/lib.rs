//! Explanation generation for wine matches and recommendations.
//!
//! Turns score breakdowns and rating provenance into text suitable for the
//! recommendation UI and the match-run report, and builds the outbound
//! Vivino / LCBO links.

mod links;
mod why;

pub use links::{
    build_vivino_search_url, is_direct_vivino_url, lcbo_link, lcbo_search_url, resolve_vivino_url,
    LCBO_BASE, VIVINO_BASE,
};
pub use why::{explain_recommendation, RecommendationContext};

use serde::{Deserialize, Serialize};
use vinolink_matcher::{ProducerAgreement, ScoreBreakdown};

/// A structured explanation of a cross-source match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation (1-2 sentences)
    pub detail: String,

    /// Unclamped match score
    pub strength: f32,

    /// Evidence items supporting this explanation
    pub evidence: Vec<EvidenceItem>,
}

/// One scored component of a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Type of evidence
    pub kind: String,

    /// Contribution to the score, formatted
    pub value: String,

    /// Optional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Confidence band used in reports: high from 0.72 up.
pub fn confidence_band(confidence: f32) -> &'static str {
    if confidence >= 0.72 {
        "high"
    } else {
        "medium"
    }
}

/// Explain why `catalog_name` was matched to `candidate_name`.
pub fn explain_match(catalog_name: &str, candidate_name: &str, score: &ScoreBreakdown) -> Explanation {
    let mut evidence = vec![EvidenceItem {
        kind: "token_overlap".to_string(),
        value: format!("{:.2}", score.base_score),
        context: Some("Jaccard similarity of significant words".to_string()),
    }];

    let producer_context = match score.producer_agreement {
        ProducerAgreement::Exact => Some("Producer equals winery"),
        ProducerAgreement::Partial => Some("Producer and winery contain one another"),
        ProducerAgreement::SharedWord => Some("Producer and winery share a word"),
        ProducerAgreement::Mismatch => Some("Producer and winery share no word"),
        ProducerAgreement::NotCompared => None,
    };
    if let Some(context) = producer_context {
        evidence.push(EvidenceItem {
            kind: "producer".to_string(),
            value: format!("{:+.2}", score.producer_adjustment),
            context: Some(context.to_string()),
        });
    }

    if score.containment_bonus > 0.0 {
        evidence.push(EvidenceItem {
            kind: "containment".to_string(),
            value: format!("{:+.2}", score.containment_bonus),
            context: Some("One full name contains the other".to_string()),
        });
    }

    Explanation {
        summary: format!("Matched '{}' to '{}'", catalog_name, candidate_name),
        detail: format!(
            "Score {:.2} from word overlap {:.2}, producer {:+.2} and containment {:+.2}.",
            score.total, score.base_score, score.producer_adjustment, score.containment_bonus
        ),
        strength: score.total,
        evidence,
    }
}
