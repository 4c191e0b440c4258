use crate::{is_trusted_signal, CandidateWine, RankingConfig};
use std::collections::HashMap;
use vinolink_features::normalize_text;
use vinolink_model::{CatalogEntry, WineType};

/// Producer + type + country. Producers compare after normalization only,
/// so "Ch. Margaux" and "Chateau Margaux" stay separate cohorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CohortKey {
    pub producer: String,
    pub wine_type: WineType,
    pub country: String,
}

impl CohortKey {
    /// `None` when the producer is unknown or too generic to group on.
    pub fn for_entry(entry: &CatalogEntry, config: &RankingConfig) -> Option<Self> {
        let producer = normalize_text(entry.producer.as_deref()?);
        if producer.is_empty() || config.is_generic_producer(&producer) {
            return None;
        }
        Some(Self {
            producer,
            wine_type: entry.wine_type,
            country: normalize_text(&entry.country),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    sum: f32,
    count: usize,
}

/// Trusted direct ratings grouped by cohort.
#[derive(Debug, Default)]
pub struct ProducerCohorts {
    tallies: HashMap<CohortKey, Tally>,
    min_sample: usize,
}

impl ProducerCohorts {
    pub fn build(candidates: &[CandidateWine], config: &RankingConfig) -> Self {
        let mut tallies: HashMap<CohortKey, Tally> = HashMap::new();
        for candidate in candidates {
            let Some(signal) = candidate.signal.as_ref() else {
                continue;
            };
            if !is_trusted_signal(Some(signal.confidence_score), config.trust_floor) {
                continue;
            }
            if let Some(key) = CohortKey::for_entry(&candidate.entry, config) {
                let tally = tallies.entry(key).or_default();
                tally.sum += signal.rating;
                tally.count += 1;
            }
        }
        Self {
            tallies,
            min_sample: config.producer_avg_min_sample,
        }
    }

    /// Mean rating rounded to one decimal, with the sample size, when the
    /// cohort is large enough.
    pub fn average(&self, key: &CohortKey) -> Option<(f32, usize)> {
        let tally = self.tallies.get(key)?;
        if tally.count < self.min_sample || tally.count == 0 {
            return None;
        }
        let mean = tally.sum / tally.count as f32;
        Some(((mean * 10.0).round() / 10.0, tally.count))
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }
}
