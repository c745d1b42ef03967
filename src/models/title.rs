use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A game owned by the user, as reported by the catalog source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedTitle {
    /// Catalog-specific identifier (Steam appid, or the name when absent)
    pub external_id: String,
    /// Display name, never empty
    pub name: String,
    pub total_playtime_minutes: u64,
    pub last_played: Option<DateTime<Utc>>,
    /// Genre and category tags
    pub tags: BTreeSet<String>,
}

impl OwnedTitle {
    pub fn playtime_hours(&self) -> f64 {
        self.total_playtime_minutes as f64 / 60.0
    }
}

/// One candidate returned by a completion-time search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionCandidate {
    pub candidate_name: String,
    pub main_hours: Option<f64>,
    pub main_plus_extra_hours: Option<f64>,
    pub completionist_hours: Option<f64>,
}

/// Completion-time statistics attached to an owned title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionStats {
    /// Name of the completion-source entry that was matched
    pub matched_name: String,
    pub main_story_hours: Option<f64>,
    pub main_plus_extra_hours: Option<f64>,
    pub completionist_hours: Option<f64>,
    /// Name similarity in [0, 1]
    pub match_confidence: f64,
}

impl CompletionStats {
    pub fn from_candidate(candidate: &CompletionCandidate, match_confidence: f64) -> Self {
        Self {
            matched_name: candidate.candidate_name.clone(),
            main_story_hours: candidate.main_hours,
            main_plus_extra_hours: candidate.main_plus_extra_hours,
            completionist_hours: candidate.completionist_hours,
            match_confidence: match_confidence.clamp(0.0, 1.0),
        }
    }
}

/// Result of resolving one owned title against the completion source
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(CompletionStats),
    /// Candidates existed but none scored above the confidence threshold
    BelowThreshold { best_confidence: f64 },
    NoCandidates,
    /// The lookup itself failed; degraded to "no match"
    LookupFailed { reason: String },
}

impl MatchOutcome {
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, MatchOutcome::LookupFailed { .. })
    }
}

/// An owned title joined with its (optional) completion statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedTitle {
    pub title: OwnedTitle,
    pub completion: Option<CompletionStats>,
}

impl EnrichedTitle {
    /// True when playtime already exceeds the main-story estimate
    pub fn is_likely_completed(&self) -> bool {
        match self.completion.as_ref().and_then(|c| c.main_story_hours) {
            Some(main) if main > 0.0 => self.title.playtime_hours() > main,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(name: &str, minutes: u64) -> OwnedTitle {
        OwnedTitle {
            external_id: name.to_string(),
            name: name.to_string(),
            total_playtime_minutes: minutes,
            last_played: None,
            tags: BTreeSet::new(),
        }
    }

    fn stats(main: Option<f64>) -> CompletionStats {
        CompletionStats {
            matched_name: "Portal 2".to_string(),
            main_story_hours: main,
            main_plus_extra_hours: None,
            completionist_hours: None,
            match_confidence: 1.0,
        }
    }

    #[test]
    fn test_playtime_hours() {
        assert_eq!(owned("Portal 2", 90).playtime_hours(), 1.5);
    }

    #[test]
    fn test_is_likely_completed() {
        let done = EnrichedTitle {
            title: owned("Portal 2", 600),
            completion: Some(stats(Some(8.5))),
        };
        assert!(done.is_likely_completed());

        let in_progress = EnrichedTitle {
            title: owned("Portal 2", 60),
            completion: Some(stats(Some(8.5))),
        };
        assert!(!in_progress.is_likely_completed());

        let unknown = EnrichedTitle {
            title: owned("Portal 2", 6000),
            completion: Some(stats(None)),
        };
        assert!(!unknown.is_likely_completed());
    }

    #[test]
    fn test_from_candidate_clamps_confidence() {
        let candidate = CompletionCandidate {
            candidate_name: "Celeste".to_string(),
            main_hours: Some(8.0),
            main_plus_extra_hours: Some(19.5),
            completionist_hours: Some(38.0),
        };
        let stats = CompletionStats::from_candidate(&candidate, 1.2);
        assert_eq!(stats.match_confidence, 1.0);
        assert_eq!(stats.matched_name, "Celeste");
        assert_eq!(stats.main_plus_extra_hours, Some(19.5));
    }
}
