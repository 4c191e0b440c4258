use std::collections::HashMap;
use tracing::debug;
use vinolink_model::WineId;

/// The catalog entry currently holding a candidate, and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Claim {
    pub wine_id: WineId,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimOutcome {
    /// The candidate was free (or already held by the same entry).
    Accepted,
    /// A strictly higher score took the candidate from another entry.
    Replaced { evicted: WineId, evicted_score: f32 },
    /// The incumbent's score was equal or higher.
    Rejected { holder: WineId, holder_score: f32 },
}

impl ClaimOutcome {
    pub fn is_won(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// 1:1 enforcement for one matching run: each candidate key is held by at
/// most one catalog entry. Built fresh per run and shared by every pass of
/// that run.
#[derive(Debug, Default)]
pub struct ClaimArbiter {
    claims: HashMap<String, Claim>,
}

impl ClaimArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose that `wine_id` holds the candidate keyed `key` with `score`.
    pub fn propose(&mut self, key: &str, wine_id: WineId, score: f32) -> ClaimOutcome {
        let proposed = Claim { wine_id, score };
        let Some(existing) = self.claims.get_mut(key) else {
            self.claims.insert(key.to_string(), proposed);
            return ClaimOutcome::Accepted;
        };

        if existing.wine_id == wine_id {
            existing.score = existing.score.max(score);
            return ClaimOutcome::Accepted;
        }

        if score > existing.score {
            let evicted = *existing;
            *existing = proposed;
            debug!(
                key,
                winner = %wine_id,
                evicted = %evicted.wine_id,
                score,
                evicted_score = evicted.score,
                "claim replaced"
            );
            ClaimOutcome::Replaced {
                evicted: evicted.wine_id,
                evicted_score: evicted.score,
            }
        } else {
            ClaimOutcome::Rejected {
                holder: existing.wine_id,
                holder_score: existing.score,
            }
        }
    }

    pub fn holder(&self, key: &str) -> Option<&Claim> {
        self.claims.get(key)
    }

    /// Key of the candidate held by `wine_id`, if any.
    #[cfg(test)]
    pub fn claimed_by(&self, wine_id: WineId) -> Option<&str> {
        self.claims
            .iter()
            .find(|(_, claim)| claim.wine_id == wine_id)
            .map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Claim)> {
        self.claims.iter().map(|(key, claim)| (key.as_str(), claim))
    }
}
