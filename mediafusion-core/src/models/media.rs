//! `Media`, `Season`, and `Episode` — the identifiable-work side of the
//! data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::id::{ExternalId, MediaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
    Tv,
    Event,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
            MediaKind::Tv => "tv",
            MediaKind::Event => "event",
        }
    }
}

/// The identifiable work a set of streams is attached to (§3 `Media`).
///
/// Invariants upheld by the store, not by this struct alone:
/// `(title, year, kind)` is unique among synthetic-id media, and
/// `external_id` is globally unique per `kind` when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaId,
    pub external_id: ExternalId,
    pub kind: MediaKind,
    pub title: String,
    pub year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
    pub genres: HashSet<String>,
    /// provider name -> numeric rating
    pub ratings: HashMap<String, f64>,
    /// role ("poster", "backdrop", "logo", ...) -> url
    pub images: HashMap<String, String>,
    pub aka_titles: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    /// Construct a freshly-discovered `Media` row (called from the
    /// Metadata Enricher the first time a title is seen).
    #[must_use]
    pub fn new(external_id: ExternalId, kind: MediaKind, title: String, year: Option<i32>) -> Self {
        let now = Utc::now();
        Self {
            id: MediaId::new(0),
            external_id,
            kind,
            title,
            year,
            end_year: None,
            description: None,
            genres: HashSet::new(),
            ratings: HashMap::new(),
            images: HashMap::new(),
            aka_titles: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The key synthetic-id uniqueness is defined against: `(title,
    /// year, kind)`.
    #[must_use]
    pub fn synthetic_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.title,
            self.year.map_or_else(String::new, |y| y.to_string()),
            self.kind.as_str()
        )
    }
}

/// A season within a series `Media` (§3 `Season / Episode`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub media_id: MediaId,
    pub season_number: u32,
}

/// `(media_id, season_number, episode_number)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub media_id: MediaId,
    pub season_number: u32,
    pub episode_number: u32,
    pub release_date: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_key_combines_title_year_kind() {
        let m = Media::new(
            ExternalId::synthetic("seed"),
            MediaKind::Movie,
            "The Matrix".to_string(),
            Some(1999),
        );
        assert_eq!(m.synthetic_key(), "The Matrix|1999|movie");
    }
}
