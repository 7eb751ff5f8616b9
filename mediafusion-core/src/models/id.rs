//! Identifier types for the aggregation engine's data model (§3).
//!
//! `Media` uses a monotone internal id assigned by the store; `Stream`
//! is keyed directly by its info-hash, so it never gets a synthetic id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable internal id for a [`crate::models::Media`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub i64);

impl MediaId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl sqlx::Type<sqlx::Postgres> for MediaId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for MediaId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for MediaId {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(<i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

/// The canonical external id of a [`crate::models::Media`]: either an
/// IMDb-style `tt\d+` id, or a synthetic `mf{hash}` id minted when no
/// IMDb id is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl ExternalId {
    /// Mint a synthetic id from a stable hash of (title, year, kind).
    #[must_use]
    pub fn synthetic(seed: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        Self(format!("mf{:016x}", hasher.finish()))
    }

    #[must_use]
    pub fn is_imdb(&self) -> bool {
        self.0.starts_with("tt") && self.0[2..].chars().all(|c| c.is_ascii_digit())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 40-character lowercase hex BitTorrent info-hash: the primary dedup
/// key for [`crate::models::Stream`] (§3, GLOSSARY).
///
/// Construction is validated so that a `DataIntegrityError` (§7) is
/// raised exactly once, at the ingest boundary, rather than re-checked
/// ad hoc by every downstream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoHash(String);

impl InfoHash {
    /// Validate and construct an info-hash. Rejects anything whose
    /// length is not exactly 40, or that contains non-hex characters,
    /// and lower-cases the input (trackers emit both cases).
    pub fn parse(raw: &str) -> Result<Self, InfoHashError> {
        if raw.len() != 40 {
            return Err(InfoHashError::WrongLength(raw.len()));
        }
        if !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InfoHashError::NotHex);
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the `magnet:?xt=urn:btih:{hash}` prefix (trackers are
    /// appended separately by callers that hold the announce list).
    #[must_use]
    pub fn magnet_base(&self) -> String {
        format!("magnet:?xt=urn:btih:{}", self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for InfoHash {
    type Error = InfoHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for InfoHash {
    type Error = InfoHashError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl sqlx::Type<sqlx::Postgres> for InfoHash {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for InfoHash {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for InfoHash {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Self::parse(&s).map_err(|e| Box::new(e) as _)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InfoHashError {
    #[error("info-hash must be 40 hex characters, got {0}")]
    WrongLength(usize),
    #[error("info-hash must contain only hex characters")]
    NotHex,
}

/// Generate a short opaque id (nanoid) for cache lock tokens and similar
/// ephemeral identifiers that never touch the relational schema.
#[must_use]
pub fn generate_token() -> String {
    nanoid::nanoid!(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_hash_accepts_40_hex_chars() {
        let h = InfoHash::parse(&"a".repeat(40)).unwrap();
        assert_eq!(h.as_str(), "a".repeat(40));
    }

    #[test]
    fn info_hash_lowercases() {
        let h = InfoHash::parse(&"A".repeat(40)).unwrap();
        assert_eq!(h.as_str(), "a".repeat(40));
    }

    #[test]
    fn info_hash_rejects_39_chars() {
        assert!(matches!(
            InfoHash::parse(&"a".repeat(39)),
            Err(InfoHashError::WrongLength(39))
        ));
    }

    #[test]
    fn info_hash_rejects_41_chars() {
        assert!(matches!(
            InfoHash::parse(&"a".repeat(41)),
            Err(InfoHashError::WrongLength(41))
        ));
    }

    #[test]
    fn info_hash_rejects_non_hex() {
        let mut s = "a".repeat(39);
        s.push('z');
        assert!(matches!(InfoHash::parse(&s), Err(InfoHashError::NotHex)));
    }

    #[test]
    fn external_id_detects_imdb() {
        assert!(ExternalId("tt0133093".to_string()).is_imdb());
        assert!(!ExternalId("mfabc123".to_string()).is_imdb());
    }

    #[test]
    fn synthetic_external_id_is_stable() {
        let a = ExternalId::synthetic("The Matrix|1999|movie");
        let b = ExternalId::synthetic("The Matrix|1999|movie");
        assert_eq!(a, b);
        assert!(a.0.starts_with("mf"));
    }
}
