//! `Stream`, `StreamFile`, and `FileMediaLink` — the playable-candidate
//! side of the data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::id::{InfoHash, MediaId};

/// The kind-specific payload a `Stream` carries (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamPayload {
    Torrent { magnet_trackers: Vec<String> },
    UsenetNzb { nzb_guid: String },
    DirectUrl { url: String },
    AceStream { ace_id: String },
    LiveM3u8 { url: String },
    TelegramFile { chat_id: String, file_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFileType {
    Video,
    Subtitle,
    Other,
}

/// A single playable candidate (§3 `Stream`).
///
/// `info_hash` is the primary dedup key: two streams that share one are
/// the same release as far as the store is concerned, even if different
/// scrapers found them (§4.3 aggregation, §4.6 upsert).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub info_hash: InfoHash,
    pub display_name: String,
    /// Scraper names that have contributed this stream, in discovery
    /// order. The orchestrator appends here on an aggregation conflict
    /// rather than overwriting (§4.3).
    pub sources: Vec<String>,
    pub payload: StreamPayload,
    /// 0 means unknown (§8 boundary cases).
    pub size_bytes: u64,
    pub resolution: Option<String>,
    pub quality: Option<String>,
    pub audio_formats: HashSet<String>,
    pub hdr_formats: HashSet<String>,
    pub channels: HashSet<String>,
    pub languages: HashSet<String>,
    pub is_remux: bool,
    pub is_proper: bool,
    pub is_repack: bool,
    pub is_extended: bool,
    pub is_dubbed: bool,
    pub is_subbed: bool,
    pub is_complete: bool,
    pub seeders: Option<u32>,
    pub trackers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_blocked: bool,
    pub vote_score: i32,
    pub playback_count: u64,
    /// Parsed `seasons` a season-pack torrent claims to contain — used
    /// by the Stream Store's media-level fallback join (§4.6).
    pub seasons: HashSet<u32>,
}

impl Stream {
    /// Merge mutable fields from a re-scrape into `self`, following the
    /// upsert contract in §4.6 / invariant 1 in §8: seeders take the
    /// max, languages/trackers union, last-seen moves forward.
    pub fn merge_from(&mut self, other: &Stream) {
        self.seeders = match (self.seeders, other.seeders) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        };
        self.languages.extend(other.languages.iter().cloned());
        for tracker in &other.trackers {
            if !self.trackers.contains(tracker) {
                self.trackers.push(tracker.clone());
            }
        }
        for source in &other.sources {
            if !self.sources.contains(source) {
                self.sources.push(source.clone());
            }
        }
        self.seasons.extend(other.seasons.iter().copied());
        if other.size_bytes > 0 && self.size_bytes == 0 {
            self.size_bytes = other.size_bytes;
        }
        self.updated_at = other.updated_at.max(self.updated_at);
    }
}

/// A file inside a multi-file torrent (§3 `StreamFile`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFile {
    pub info_hash: InfoHash,
    pub index_within_torrent: u32,
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: MediaFileType,
    pub parsed_season: Option<u32>,
    pub parsed_episode: Option<u32>,
    pub parsed_title: Option<String>,
}

/// Explicit mapping from a `StreamFile` to `(media, season, episode)`
/// (§3 `FileMediaLink`), so a season-pack stream serves episode-specific
/// queries without re-parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMediaLink {
    pub info_hash: InfoHash,
    pub file_index: u32,
    pub media_id: MediaId,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hash: &str, seeders: Option<u32>) -> Stream {
        let now = Utc::now();
        Stream {
            info_hash: InfoHash::parse(hash).unwrap(),
            display_name: "Sample.2020.1080p".to_string(),
            sources: vec!["scraper-a".to_string()],
            payload: StreamPayload::Torrent {
                magnet_trackers: vec![],
            },
            size_bytes: 0,
            resolution: Some("1080p".to_string()),
            quality: None,
            audio_formats: HashSet::new(),
            hdr_formats: HashSet::new(),
            channels: HashSet::new(),
            languages: ["english".to_string()].into_iter().collect(),
            is_remux: false,
            is_proper: false,
            is_repack: false,
            is_extended: false,
            is_dubbed: false,
            is_subbed: false,
            is_complete: false,
            seeders,
            trackers: vec!["tracker-a".to_string()],
            created_at: now,
            updated_at: now,
            is_active: true,
            is_blocked: false,
            vote_score: 0,
            playback_count: 0,
            seasons: HashSet::new(),
        }
    }

    #[test]
    fn merge_takes_max_seeders() {
        let mut a = sample(&"a".repeat(40), Some(10));
        let b = sample(&"a".repeat(40), Some(25));
        a.merge_from(&b);
        assert_eq!(a.seeders, Some(25));
    }

    #[test]
    fn merge_unions_languages_and_trackers() {
        let mut a = sample(&"a".repeat(40), Some(10));
        let mut b = sample(&"a".repeat(40), Some(5));
        b.languages.insert("french".to_string());
        b.trackers.push("tracker-b".to_string());
        a.merge_from(&b);
        assert!(a.languages.contains("french"));
        assert!(a.trackers.contains(&"tracker-b".to_string()));
        // max-seeders still holds with b providing the smaller count
        assert_eq!(a.seeders, Some(10));
    }

    #[test]
    fn merge_keeps_existing_seeders_when_new_is_none() {
        let mut a = sample(&"a".repeat(40), Some(10));
        let b = sample(&"a".repeat(40), None);
        a.merge_from(&b);
        assert_eq!(a.seeders, Some(10));
    }
}
