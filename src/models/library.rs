use serde::{Deserialize, Serialize};

use super::EnrichedTitle;

/// Number of titles per playtime band
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaytimeDistribution {
    pub unplayed: usize,
    pub under_two_hours: usize,
    pub two_to_ten_hours: usize,
    pub ten_to_fifty_hours: usize,
    pub fifty_hours_plus: usize,
}

impl PlaytimeDistribution {
    pub fn record(&mut self, playtime_minutes: u64) {
        match playtime_minutes {
            0 => self.unplayed += 1,
            1..=119 => self.under_two_hours += 1,
            120..=599 => self.two_to_ten_hours += 1,
            600..=2999 => self.ten_to_fifty_hours += 1,
            _ => self.fifty_hours_plus += 1,
        }
    }
}

/// The user's enriched library plus derived statistics.
///
/// Recomputed on every request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibrarySummary {
    /// Enriched titles in ownership order
    pub titles: Vec<EnrichedTitle>,
    pub total_playtime_minutes: u64,
    pub title_count: usize,
    /// Titles with completion statistics attached
    pub matched_count: usize,
    /// Completion lookups that failed and were degraded to "no match"
    pub lookup_failures: usize,
    /// Indices into `titles`, most played first
    pub playtime_rank: Vec<usize>,
    pub playtime_distribution: PlaytimeDistribution,
}

impl LibrarySummary {
    /// Titles in playtime-rank order
    pub fn ranked_titles(&self) -> impl Iterator<Item = &EnrichedTitle> {
        self.playtime_rank.iter().filter_map(|&i| self.titles.get(i))
    }

    pub fn most_played(&self) -> Option<&EnrichedTitle> {
        self.ranked_titles().next()
    }
}
