use std::collections::{BTreeSet, HashMap};
use vinolink_features::normalize_text;
use vinolink_model::WineryRef;

/// How a producer was resolved to a winery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WineryResolution {
    Exact,
    Substring,
    /// Share of significant words in common
    TokenOverlap(f32),
}

/// Wineries seen during a crawl, keyed by normalized name. The first
/// winery seen under a name wins.
#[derive(Debug, Default)]
pub struct WineryDirectory {
    wineries: Vec<(String, WineryRef)>,
    by_name: HashMap<String, usize>,
}

impl WineryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, winery: WineryRef) -> bool {
        let key = normalize_text(&winery.name);
        if key.is_empty() || self.by_name.contains_key(&key) {
            return false;
        }
        self.by_name.insert(key.clone(), self.wineries.len());
        self.wineries.push((key, winery));
        true
    }

    pub fn extend(&mut self, wineries: impl IntoIterator<Item = WineryRef>) {
        for winery in wineries {
            self.insert(winery);
        }
    }

    pub fn len(&self) -> usize {
        self.wineries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wineries.is_empty()
    }

    /// Find the winery for a normalized producer name: exact name, then
    /// substring either way (first seen wins), then the best word overlap
    /// of at least one half over words longer than two characters.
    pub fn resolve(&self, producer_normalized: &str) -> Option<(&WineryRef, WineryResolution)> {
        if producer_normalized.is_empty() {
            return None;
        }

        if let Some(&position) = self.by_name.get(producer_normalized) {
            return Some((&self.wineries[position].1, WineryResolution::Exact));
        }

        if let Some((_, winery)) = self
            .wineries
            .iter()
            .find(|(key, _)| key.contains(producer_normalized) || producer_normalized.contains(key.as_str()))
        {
            return Some((winery, WineryResolution::Substring));
        }

        let producer_words = long_words(producer_normalized);
        if producer_words.is_empty() {
            return None;
        }

        let mut best: Option<(&WineryRef, f32)> = None;
        for (key, winery) in &self.wineries {
            let winery_words = long_words(key);
            let overlap = producer_words.intersection(&winery_words).count();
            let score = overlap as f32 / producer_words.len().max(winery_words.len()) as f32;
            if score >= 0.5 && best.map_or(true, |(_, top)| score > top) {
                best = Some((winery, score));
            }
        }
        best.map(|(winery, score)| (winery, WineryResolution::TokenOverlap(score)))
    }
}

fn long_words(normalized: &str) -> BTreeSet<&str> {
    normalized.split(' ').filter(|w| w.len() > 2).collect()
}
