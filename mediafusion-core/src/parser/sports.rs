//! Sports-mode entry point to the Title Parser (§4.1): detects a sports
//! category, round number, event date, and a cleaned event title.

use once_cell::sync::Lazy;
use regex::Regex;

const SPORTS_KEYWORDS: &[(&str, &[&str])] = &[
    ("Formula Racing", &["f1", "formula 1", "f2", "formula 2", "f3", "formula 3"]),
    ("MotoGP", &["motogp", "moto2", "moto3"]),
    ("WWE", &["wwe", "raw", "smackdown", "nxt"]),
    ("UFC", &["ufc"]),
    ("NBA", &["nba"]),
    ("NFL", &["nfl"]),
    ("Cricket", &["cricket", "ipl", "t20", "odi"]),
];

static RE_ROUND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bround\s*(\d{1,2})\b").unwrap());
static RE_DATE_DMY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2})\.(\d{2})\.(\d{4})\b").unwrap());
static RE_DATE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());
static RE_DATE_COMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})x(\d{2})\b").unwrap());

/// A cleaned sports-event record (§4.1 "sports mode").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SportsTitle {
    pub category: Option<String>,
    pub round: Option<u32>,
    /// ISO `YYYY-MM-DD`, normalized from whichever input format matched.
    pub event_date: Option<String>,
    pub title: String,
}

/// Detect a sports category and parse round/date/title. Returns `None`
/// when no configured keyword matches — callers fall back to the
/// general-purpose [`crate::parser::parse`].
#[must_use]
pub fn parse_sports_title(raw: &str) -> Option<SportsTitle> {
    let lower = raw.to_lowercase();
    let category = SPORTS_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(name, _)| (*name).to_string())?;

    let round = RE_ROUND.captures(raw).and_then(|c| c[1].parse().ok());
    let event_date = extract_date(raw);

    let mut cleaned = raw.to_string();
    for re in [&*RE_DATE_DMY, &*RE_DATE_ISO, &*RE_DATE_COMPACT, &*RE_ROUND] {
        cleaned = re.replace_all(&cleaned, " ").to_string();
    }
    // strip broadcaster/resolution noise the same way the general parser does
    for token in ["1080p", "720p", "2160p", "4k", "WEB-DL", "HDTV", "SKY", "BT SPORT"] {
        cleaned = cleaned.replace(token, " ");
    }
    let title = cleaned.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string();

    Some(SportsTitle {
        category: Some(category),
        round,
        event_date,
        title,
    })
}

fn extract_date(raw: &str) -> Option<String> {
    if let Some(c) = RE_DATE_ISO.captures(raw) {
        return Some(format!("{}-{}-{}", &c[1], &c[2], &c[3]));
    }
    if let Some(c) = RE_DATE_DMY.captures(raw) {
        return Some(format!("{}-{}-{}", &c[3], &c[2], &c[1]));
    }
    if let Some(c) = RE_DATE_COMPACT.captures(raw) {
        // YYYYxNN: a round-indexed placeholder, not a concrete date.
        return Some(format!("{}-W{}", &c[1], &c[2]));
    }
    None
}
