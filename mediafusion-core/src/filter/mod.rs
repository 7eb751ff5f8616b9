//! Filter/Sort Engine (§4.4): an eight-step pipeline from raw streams to
//! a ranked, capped list plus a drop-reason histogram the UI uses to
//! explain empty results.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{SortDirection, SortKey, Stream, UserPreferenceVector};

/// Exact drop-reason labels the UI keys off of (§4.4).
pub mod reasons {
    pub const RESOLUTION_NOT_SELECTED: &str = "Resolution Not Selected";
    pub const QUALITY_NOT_SELECTED: &str = "Quality Not Selected";
    pub const LANGUAGE_NOT_SELECTED: &str = "Language Not Selected";
    pub const MIN_SIZE_NOT_MET: &str = "Min Size Not Met";
    pub const MAX_SIZE_EXCEEDED: &str = "Max Size Exceeded";
    pub const STREAM_NAME_FILTER: &str = "Stream Name Filter";
}

pub type DropHistogram = HashMap<String, u32>;

/// Run the full pipeline. `context_key` is accepted for parity with the
/// described signature (`(streams, preferences, context_key)`) but the
/// engine itself is pure with respect to it — callers use it only to
/// key their own request-scoped logging.
pub fn filter_and_sort(
    streams: Vec<Stream>,
    preferences: &UserPreferenceVector,
    _context_key: &str,
) -> (Vec<Stream>, DropHistogram) {
    let mut histogram = DropHistogram::new();
    let mut survivors = Vec::with_capacity(streams.len());

    for stream in streams {
        if let Some(reason) = first_drop_reason(&stream, preferences) {
            *histogram.entry(reason.to_string()).or_insert(0) += 1;
            continue;
        }
        survivors.push(stream);
    }

    sort_streams(&mut survivors, preferences);
    let survivors = apply_per_resolution_cap(survivors, preferences.max_streams_per_resolution);

    let survivors = if preferences.max_total_streams == 0 {
        Vec::new()
    } else {
        survivors.into_iter().take(preferences.max_total_streams as usize).collect()
    };

    (survivors, histogram)
}

fn first_drop_reason(stream: &Stream, preferences: &UserPreferenceVector) -> Option<&'static str> {
    if !preferences.selected_resolutions.is_empty() && !matches_any(&stream.resolution, &preferences.selected_resolutions)
    {
        return Some(reasons::RESOLUTION_NOT_SELECTED);
    }

    if !preferences.quality_filter.is_empty() && !matches_any(&stream.quality, &preferences.quality_filter) {
        return Some(reasons::QUALITY_NOT_SELECTED);
    }

    if !preferences.languages.is_empty() && language_rank(stream, &preferences.languages).is_none() {
        return Some(reasons::LANGUAGE_NOT_SELECTED);
    }

    if stream.size_bytes > 0 {
        if preferences.max_size > 0 && stream.size_bytes > preferences.max_size {
            return Some(reasons::MAX_SIZE_EXCEEDED);
        }
        if preferences.min_size > 0 && stream.size_bytes < preferences.min_size {
            return Some(reasons::MIN_SIZE_NOT_MET);
        }
    }

    if !passes_name_filter(stream, &preferences.stream_name_filter) {
        return Some(reasons::STREAM_NAME_FILTER);
    }

    None
}

fn matches_any(value: &Option<String>, allowed: &[String]) -> bool {
    let Some(value) = value else { return false };
    allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(value))
}

/// Index of the best (lowest-index, i.e. most preferred) language match,
/// or `None` if nothing in `stream.languages` appears in `preferred`.
fn language_rank(stream: &Stream, preferred: &[String]) -> Option<usize> {
    preferred
        .iter()
        .position(|p| stream.languages.iter().any(|l| l.eq_ignore_ascii_case(p)))
}

fn passes_name_filter(stream: &Stream, filter: &crate::models::StreamNameFilter) -> bool {
    use crate::models::NameFilterMode;

    match filter.mode {
        NameFilterMode::Disabled => true,
        NameFilterMode::Include => {
            filter.patterns.iter().any(|pattern| name_matches(&stream.display_name, pattern, filter.is_regex))
        }
        NameFilterMode::Exclude => {
            !filter.patterns.iter().any(|pattern| name_matches(&stream.display_name, pattern, filter.is_regex))
        }
    }
}

fn name_matches(display_name: &str, pattern: &str, is_regex: bool) -> bool {
    if is_regex {
        regex::Regex::new(pattern).is_ok_and(|re| re.is_match(display_name))
    } else {
        display_name.to_lowercase().contains(&pattern.to_lowercase())
    }
}

fn sort_streams(streams: &mut [Stream], preferences: &UserPreferenceVector) {
    streams.sort_by(|a, b| {
        for rule in &preferences.sorting_priority {
            let ordering = compare_key(a, b, rule.key, preferences);
            let ordering = match rule.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_key(a: &Stream, b: &Stream, key: SortKey, preferences: &UserPreferenceVector) -> Ordering {
    sort_value(a, key, preferences).total_cmp(&sort_value(b, key, preferences))
}

/// Numeric projection for a single sort key. Position-ranked keys
/// (resolution/quality/language) score higher for an earlier position
/// in the user's preference list, so `Desc` + "most preferred" sorts
/// first; unranked/missing values score 0 (§4.4: "unknown keys sort as
/// 0").
fn sort_value(stream: &Stream, key: SortKey, preferences: &UserPreferenceVector) -> f64 {
    match key {
        SortKey::Resolution => position_score(&stream.resolution, &preferences.selected_resolutions),
        SortKey::Quality => position_score(&stream.quality, &preferences.quality_filter),
        SortKey::Language => match language_rank(stream, &preferences.languages) {
            Some(index) => (preferences.languages.len() - index) as f64,
            None => 0.0,
        },
        SortKey::Size => stream.size_bytes as f64,
        SortKey::Seeders => stream.seeders.unwrap_or(0) as f64,
        SortKey::CreatedAt => stream.created_at.timestamp() as f64,
        SortKey::VoteScore => stream.vote_score as f64,
        SortKey::PlaybackCount => stream.playback_count as f64,
    }
}

fn position_score(value: &Option<String>, preference_list: &[String]) -> f64 {
    let Some(value) = value else { return 0.0 };
    match preference_list.iter().position(|p| p.eq_ignore_ascii_case(value)) {
        Some(index) => (preference_list.len() - index) as f64,
        None => 0.0,
    }
}

fn apply_per_resolution_cap(streams: Vec<Stream>, cap: u32) -> Vec<Stream> {
    if cap == 0 {
        return streams;
    }
    let mut seen: HashMap<String, u32> = HashMap::new();
    streams
        .into_iter()
        .filter(|stream| {
            let key = stream.resolution.clone().unwrap_or_else(|| "unknown".to_string());
            let count = seen.entry(key).or_insert(0);
            *count += 1;
            *count <= cap
        })
        .collect()
}
