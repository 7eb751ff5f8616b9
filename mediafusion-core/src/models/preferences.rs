//! The per-request `UserPreferenceVector` (§3, §4.4).
//!
//! Per DESIGN NOTES in the spec: the source represents this as a
//! duck-typed config dict with many optional fields and short aliases.
//! Here it is a versioned typed record with explicit defaults — the
//! aliases become a wire-format (`serde(alias = ...)`) concern, not a
//! type-level one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Resolution,
    Quality,
    Language,
    Size,
    Seeders,
    CreatedAt,
    VoteScore,
    PlaybackCount,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SortRule {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameFilterMode {
    Disabled,
    Include,
    Exclude,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamNameFilter {
    pub mode: NameFilterMode,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub is_regex: bool,
}

impl Default for StreamNameFilter {
    fn default() -> Self {
        Self {
            mode: NameFilterMode::Disabled,
            patterns: Vec::new(),
            is_regex: false,
        }
    }
}

/// Versioned, explicitly-defaulted preference vector (§4.4 table).
///
/// Never persisted by the core (§3); it arrives fully resolved from the
/// routing layer on every `StreamRequest` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferenceVector {
    pub version: u32,
    /// Empty means "allow all" (§8 boundary case).
    pub selected_resolutions: Vec<String>,
    /// Empty means "allow all".
    pub quality_filter: Vec<String>,
    /// Ordered by preference; empty means "allow all".
    pub languages: Vec<String>,
    /// 0 = unlimited.
    pub max_size: u64,
    /// 0 = no minimum.
    pub min_size: u64,
    /// 0 = unlimited.
    pub max_streams_per_resolution: u32,
    /// 0 short-circuits to an empty result (§8 boundary case).
    pub max_total_streams: u32,
    pub sorting_priority: Vec<SortRule>,
    pub stream_name_filter: StreamNameFilter,
}

impl Default for UserPreferenceVector {
    fn default() -> Self {
        Self {
            version: 1,
            selected_resolutions: Vec::new(),
            quality_filter: Vec::new(),
            languages: Vec::new(),
            max_size: 0,
            min_size: 0,
            max_streams_per_resolution: 0,
            max_total_streams: 50,
            sorting_priority: vec![
                SortRule {
                    key: SortKey::Resolution,
                    direction: SortDirection::Desc,
                },
                SortRule {
                    key: SortKey::Seeders,
                    direction: SortDirection::Desc,
                },
            ],
            stream_name_filter: StreamNameFilter::default(),
        }
    }
}

impl UserPreferenceVector {
    /// Validate the vector, returning the set of problems found.
    /// Used by the caller-facing layer to raise `Error::Validation`
    /// (§7: "ValidationError... Returned as a structured 4xx").
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.min_size > 0 && self.max_size > 0 && self.min_size > self.max_size {
            problems.push("min_size must not exceed max_size".to_string());
        }
        if matches!(self.stream_name_filter.mode, NameFilterMode::Include | NameFilterMode::Exclude)
            && self.stream_name_filter.patterns.is_empty()
        {
            problems.push("stream_name_filter patterns must not be empty when mode is not disabled".to_string());
        }
        if self.stream_name_filter.is_regex {
            for pattern in &self.stream_name_filter.patterns {
                if regex::Regex::new(pattern).is_err() {
                    problems.push(format!("invalid regex pattern: {pattern}"));
                }
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vector_is_valid() {
        assert!(UserPreferenceVector::default().validate().is_empty());
    }

    #[test]
    fn min_greater_than_max_is_invalid() {
        let mut p = UserPreferenceVector::default();
        p.min_size = 100;
        p.max_size = 50;
        assert!(!p.validate().is_empty());
    }

    #[test]
    fn include_filter_with_no_patterns_is_invalid() {
        let mut p = UserPreferenceVector::default();
        p.stream_name_filter.mode = NameFilterMode::Include;
        assert!(!p.validate().is_empty());
    }

    #[test]
    fn bad_regex_pattern_is_invalid() {
        let mut p = UserPreferenceVector::default();
        p.stream_name_filter.mode = NameFilterMode::Include;
        p.stream_name_filter.is_regex = true;
        p.stream_name_filter.patterns = vec!["(unterminated".to_string()];
        assert!(!p.validate().is_empty());
    }
}
