//! Title Parser (§4.1): a raw torrent/filename string in, a
//! best-effort `ParsedTitle` out. Pure, deterministic, infallible.

mod sports;

pub use sports::{parse_sports_title, SportsTitle};

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Canonical resolution tags, ordered coarse-to-fine for the "closest by
/// height" rule on raw `{w}x{h}` numerics.
const CANONICAL_RESOLUTIONS: &[(&str, u32)] = &[
    ("240p", 240),
    ("360p", 360),
    ("480p", 480),
    ("576p", 576),
    ("720p", 720),
    ("1080p", 1080),
    ("1440p", 1440),
    ("2160p", 2160),
];

static RE_RESOLUTION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(4k|2160p|1440p|1080p|720p|576p|480p|360p|240p|uhd|fhd|hd|sd)\b").unwrap());
static RE_RESOLUTION_WXH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3,4})x(\d{3,4})\b").unwrap());
static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\(|\[|\b)((?:19|20)\d{2})(?:\)|\]|\b)").unwrap());
static RE_SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})E(\d{1,3})(?:-?E?(\d{1,3}))?\b").unwrap());
static RE_SEASON_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})\b").unwrap());
static RE_SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})-S?(\d{1,2})\b").unwrap());
static RE_EPISODE_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bE(?:p(?:isode)?)?\.?\s*(\d{1,3})\b").unwrap());
static RE_CODEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x\.?264|x\.?265|h\.?264|h\.?265|hevc|av1|vp9|xvid|divx)\b").unwrap());
static RE_AUDIO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(flac|truehd|true\s?hd|dts-?hd|dts|ac3|eac3|e-?ac-?3|aac|opus|mp3)\b").unwrap());
static RE_CHANNELS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d)\.(\d)\b").unwrap());
static RE_HDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(hdr10\+?|hdr|dolby\s?vision|dovi|dv|hlg)\b").unwrap());
static RE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)$").unwrap());
static RE_CONTAINER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|ts|m2ts|webm)$").unwrap());

const QUALITY_GROUPS: &[(&str, &[&str])] = &[
    ("BluRay/UHD", &["bluray", "blu-ray", "remux", "bdrip", "brrip", "uhdrip", "bdremux"]),
    ("WEB/HD", &["web-dl", "webdl", "webrip", "webmux", "hdrip", "web"]),
    ("DVD/TV/SAT", &["dvdrip", "dvd", "hdtv", "satrip", "tvrip", "pdtv", "ppvrip"]),
    ("CAM/Screener", &["cam", "telesync", "ts", "telecine", "tc", "scr", "screener"]),
];

/// Configured language substrings; callers with a custom table should
/// build one via [`parse_with_languages`]. Exposed defaults cover the
/// languages the original source's scrapers emit most often.
pub const DEFAULT_LANGUAGE_TABLE: &[&str] = &[
    "english", "hindi", "tamil", "telugu", "malayalam", "kannada", "bengali", "punjabi",
    "marathi", "gujarati", "urdu", "french", "german", "spanish", "italian", "russian",
    "japanese", "korean", "chinese", "portuguese", "dutch", "polish", "turkish", "arabic",
    "multi", "dual",
];

/// The parser's output: a best-effort structured record (§4.1).
///
/// Every field is optional/collection-valued except `title`, which is
/// always populated — on fully ambiguous input it falls back to the
/// cleaned, full input string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u32>,
    pub seasons: Vec<u32>,
    pub episodes: Vec<u32>,
    pub resolution: Option<String>,
    pub codec: Option<String>,
    pub quality: Option<String>,
    pub audio: Vec<String>,
    pub channels: Vec<String>,
    pub hdr: Vec<String>,
    pub languages: Vec<String>,
    pub is_remux: bool,
    pub is_proper: bool,
    pub is_repack: bool,
    pub is_extended: bool,
    pub is_dubbed: bool,
    pub is_subbed: bool,
    pub is_complete: bool,
    pub release_group: Option<String>,
    pub container: Option<String>,
}

/// Parse a raw title with the default language table.
#[must_use]
pub fn parse(raw: &str) -> ParsedTitle {
    parse_with_languages(raw, DEFAULT_LANGUAGE_TABLE)
}

static RE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d.,]+)\s*(tb|gb|mb|kb|b)\b").unwrap());

/// Parse a human-readable size string (`"1.5 GB"`, `"700MB"`) into bytes.
/// Scrapers that surface size as free text rather than a raw byte count
/// share this rather than each hand-rolling a unit table. Returns `None`
/// on anything that doesn't match a recognized unit suffix, rather than
/// guessing.
#[must_use]
pub fn parse_size_string(raw: &str) -> Option<u64> {
    let caps = RE_SIZE.captures(raw)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier: f64 = match caps[2].to_lowercase().as_str() {
        "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        "mb" => 1024.0 * 1024.0,
        "kb" => 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier) as u64)
}

/// Parse a raw title against a caller-supplied language table (§4.1
/// "primary source is substring match against a configured language
/// table").
#[must_use]
pub fn parse_with_languages(raw: &str, languages: &[&str]) -> ParsedTitle {
    let cleaned = normalize_separators(raw);
    let lower = cleaned.to_lowercase();

    let mut result = ParsedTitle {
        resolution: extract_resolution(raw),
        codec: extract_first(&RE_CODEC, raw).map(|s| normalize_codec_token(&s)),
        quality: extract_quality(&lower),
        audio: extract_audio(&lower),
        channels: extract_all(&RE_CHANNELS, raw),
        hdr: extract_hdr(&lower),
        languages: extract_languages(&lower, languages),
        year: extract_first(&RE_YEAR, raw).and_then(|s| s.parse().ok()),
        release_group: extract_first(&RE_GROUP, raw),
        container: extract_first(&RE_CONTAINER, raw).map(|s| s.to_lowercase()),
        is_remux: lower.contains("remux"),
        is_proper: has_word(&lower, "proper"),
        is_repack: has_word(&lower, "repack"),
        is_extended: has_word(&lower, "extended"),
        is_dubbed: has_word(&lower, "dubbed") || has_word(&lower, "dub"),
        is_subbed: has_word(&lower, "subbed") || has_word(&lower, "sub"),
        is_complete: has_word(&lower, "complete") || has_word(&lower, "batch"),
        ..ParsedTitle::default()
    };

    extract_season_episode(raw, &mut result);

    if result.languages.is_empty() && (lower.contains("multi audio") || lower.contains("dual audio")) {
        result.languages.push(if lower.contains("dual") { "dual".to_string() } else { "multi".to_string() });
    }

    result.title = extract_title(&cleaned, &result);
    result
}

fn normalize_separators(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for c in raw.chars() {
        if matches!(c, '.' | '_' | '-' | ' ') {
            if !last_was_sep {
                out.push(' ');
                last_was_sep = true;
            }
        } else {
            out.push(c);
            last_was_sep = false;
        }
    }
    out.trim().to_string()
}

fn has_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|tok| tok == word)
}

fn extract_first(re: &Regex, input: &str) -> Option<String> {
    re.captures(input).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

fn extract_all(re: &Regex, input: &str) -> Vec<String> {
    re.captures_iter(input)
        .map(|c| format!("{}.{}", &c[1], &c[2]))
        .collect()
}

fn extract_resolution(input: &str) -> Option<String> {
    if let Some(tag) = RE_RESOLUTION_TAG.captures(input).map(|c| c[1].to_lowercase()) {
        return Some(match tag.as_str() {
            "uhd" => "4k".to_string(),
            "fhd" => "1080p".to_string(),
            "hd" => "720p".to_string(),
            "sd" => "576p".to_string(),
            other => other.to_string(),
        });
    }
    RE_RESOLUTION_WXH.captures(input).and_then(|c| {
        let height: u32 = c[2].parse().ok()?;
        nearest_canonical_resolution(height)
    })
}

fn nearest_canonical_resolution(height: u32) -> Option<String> {
    CANONICAL_RESOLUTIONS
        .iter()
        .min_by_key(|(_, h)| (*h as i64 - height as i64).abs())
        .map(|(tag, _)| (*tag).to_string())
}

/// Lowercases and strips the separator dot (`x.264` -> `x264`) but keeps
/// the detected token as-is otherwise — `x264` and `h264` are distinct
/// release tags and the parser doesn't collapse them (S6).
fn normalize_codec_token(raw: &str) -> String {
    raw.to_lowercase().replace('.', "")
}

fn extract_quality(lower: &str) -> Option<String> {
    for (group, tokens) in QUALITY_GROUPS {
        for token in *tokens {
            if lower.contains(token) {
                return Some((*group).to_string());
            }
        }
    }
    None
}

fn extract_audio(lower: &str) -> Vec<String> {
    RE_AUDIO
        .captures_iter(lower)
        .map(|c| c[1].replace(' ', "").replace('-', ""))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect()
}

fn extract_hdr(lower: &str) -> Vec<String> {
    RE_HDR
        .captures_iter(lower)
        .map(|c| {
            let tag = c[1].replace(' ', "").replace('-', "");
            if tag == "dv" || tag == "dovi" {
                "dolbyvision".to_string()
            } else {
                tag
            }
        })
        .collect::<HashSet<_>>()
        .into_iter()
        .collect()
}

fn extract_languages(lower: &str, table: &[&str]) -> Vec<String> {
    table.iter().filter(|lang| lower.contains(*lang)).map(|s| (*s).to_string()).collect()
}

fn extract_season_episode(input: &str, result: &mut ParsedTitle) {
    if let Some(caps) = RE_SEASON_RANGE.captures(input) {
        if let (Ok(a), Ok(b)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            if a <= b {
                result.seasons.extend(a..=b);
                return;
            }
        }
    }
    if let Some(caps) = RE_SEASON_EPISODE.captures(input) {
        if let Ok(s) = caps[1].parse::<u32>() {
            result.seasons.push(s);
        }
        if let Ok(e_start) = caps[2].parse::<u32>() {
            if let Some(e_end) = caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok()) {
                if e_start <= e_end {
                    result.episodes.extend(e_start..=e_end);
                } else {
                    result.episodes.push(e_start);
                }
            } else {
                result.episodes.push(e_start);
            }
        }
        return;
    }
    if let Some(caps) = RE_SEASON_ONLY.captures(input) {
        if let Ok(s) = caps[1].parse::<u32>() {
            result.seasons.push(s);
        }
    }
    if let Some(caps) = RE_EPISODE_ONLY.captures(input) {
        if let Ok(e) = caps[1].parse::<u32>() {
            result.episodes.push(e);
        }
    }
}

/// Everything before the first recognized metadata token, trimmed.
/// Falls back to the full cleaned input when nothing was recognized —
/// the parser must never fail, so "no metadata found" degrades to
/// "whole string is the title" rather than `None`.
fn extract_title(cleaned: &str, result: &ParsedTitle) -> String {
    let markers: Vec<&str> = [
        result.resolution.as_deref(),
        result.year.map(|_| "").filter(|_| false),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut cut_at = cleaned.len();
    if let Some(year_match) = RE_YEAR.find(cleaned) {
        cut_at = cut_at.min(year_match.start());
    }
    if let Some(tag_match) = RE_RESOLUTION_TAG.find(cleaned) {
        cut_at = cut_at.min(tag_match.start());
    }
    if let Some(se_match) = RE_SEASON_EPISODE.find(cleaned) {
        cut_at = cut_at.min(se_match.start());
    } else if let Some(s_match) = RE_SEASON_ONLY.find(cleaned) {
        cut_at = cut_at.min(s_match.start());
    }
    let _ = markers;

    let title = cleaned[..cut_at].trim().trim_end_matches(['-', '.']).trim().to_string();
    if title.is_empty() {
        cleaned.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_movie_release() {
        let p = parse("The.Matrix.1999.1080p.BluRay.x264.DTS-GROUP");
        assert_eq!(p.title, "The Matrix");
        assert_eq!(p.year, Some(1999));
        assert_eq!(p.resolution.as_deref(), Some("1080p"));
        assert_eq!(p.quality.as_deref(), Some("BluRay/UHD"));
        assert_eq!(p.codec.as_deref(), Some("x264"));
        assert!(p.audio.contains(&"dts".to_string()));
        assert_eq!(p.release_group.as_deref(), Some("GROUP"));
    }

    #[test]
    fn codec_token_is_preserved_not_canonicalized() {
        let p = parse("Movie.2020.1080p.HEVC-GROUP");
        assert_eq!(p.codec.as_deref(), Some("hevc"));
        let p = parse("Movie.2020.1080p.x265-GROUP");
        assert_eq!(p.codec.as_deref(), Some("x265"));
    }

    #[test]
    fn parses_series_season_episode() {
        let p = parse("Breaking.Bad.S02E05.720p.WEB-DL.AAC");
        assert_eq!(p.seasons, vec![2]);
        assert_eq!(p.episodes, vec![5]);
        assert_eq!(p.resolution.as_deref(), Some("720p"));
        assert_eq!(p.quality.as_deref(), Some("WEB/HD"));
    }

    #[test]
    fn parses_episode_range() {
        let p = parse("Some.Show.S01E01-E04.1080p");
        assert_eq!(p.seasons, vec![1]);
        assert_eq!(p.episodes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn uhd_equivalence_maps_to_4k() {
        let p = parse("Movie.2020.UHD.Remux");
        assert_eq!(p.resolution.as_deref(), Some("4k"));
        assert!(p.is_remux);
    }

    #[test]
    fn wxh_numeric_maps_to_closest_canonical() {
        let p = parse("Clip.1920x1080.mkv");
        assert_eq!(p.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn never_fails_on_empty_input() {
        let p = parse("");
        assert_eq!(p.title, "");
    }

    #[test]
    fn ambiguous_input_falls_back_to_full_string_as_title() {
        let p = parse("just a plain name with no metadata");
        assert_eq!(p.title, "just a plain name with no metadata");
    }

    #[test]
    fn detects_multi_audio_synthetic_token() {
        let p = parse("Movie.2021.1080p.Multi.Audio.WEB-DL");
        assert!(p.languages.contains(&"multi".to_string()));
    }

    #[test]
    fn detects_language_substring() {
        let p = parse("Movie.2021.Hindi.1080p.WEBRip");
        assert!(p.languages.contains(&"hindi".to_string()));
    }

    #[test]
    fn detects_remux_proper_repack_flags() {
        let p = parse("Show.S01E01.PROPER.REPACK.1080p.BluRay.REMUX");
        assert!(p.is_proper);
        assert!(p.is_repack);
        assert!(p.is_remux);
    }

    #[test]
    fn parses_gb_size_string() {
        assert_eq!(parse_size_string("1.5 GB"), Some((1.5 * 1024.0 * 1024.0 * 1024.0) as u64));
    }

    #[test]
    fn parses_mb_size_string_without_space() {
        assert_eq!(parse_size_string("700MB"), Some(700 * 1024 * 1024));
    }

    #[test]
    fn size_string_with_no_recognized_unit_is_none() {
        assert_eq!(parse_size_string("unknown size"), None);
    }
}
