//! `AvailabilityRecord` and the debrid resolution state machine (§3, §4.5).
//!
//! The generic `(key, value-bytes, expires-at)` Cache Entry itself has no
//! dedicated struct: it is represented directly by the cache backend
//! (see [`crate::cache`]) as raw bytes plus a TTL, the way the teacher's
//! Redis-backed caches do. What deserves a typed model is the record
//! shape layered on top of that cache for provider availability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `(provider, info_hash)` availability fact (§3 `Availability Record`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub is_cached: bool,
    pub expires_at: DateTime<Utc>,
}

impl AvailabilityRecord {
    #[must_use]
    pub fn fresh(is_cached: bool, ttl: chrono::Duration) -> Self {
        Self {
            is_cached,
            expires_at: Utc::now() + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Per-(provider, hash) resolution state machine (§4.5).
///
/// Only `Ready` and `Resolved` may ever produce a direct URL; every other
/// state means the caller gets either "still working" or the error asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionState {
    Init,
    Submitting,
    Queued,
    Downloading,
    Ready,
    Resolved,
    /// Terminal but retryable after `retry_after`.
    Error { kind: ErrorKind, retry_after: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Quota,
    Content,
    Timeout,
    Protocol,
    Network,
}

impl ResolutionState {
    /// Validates the transitions enumerated in §4.5's diagram. Returns
    /// `false` for any edge not drawn there (e.g. `Ready` -> `Queued`).
    #[must_use]
    pub fn can_transition_to(&self, next: &ResolutionState) -> bool {
        use ResolutionState::{Downloading, Error, Init, Queued, Ready, Resolved, Submitting};
        matches!(
            (self, next),
            (Init, Submitting)
                | (Submitting, Queued)
                | (Queued, Downloading)
                | (Downloading, Ready)
                | (Ready, Resolved)
                | (_, Error { .. })
        )
    }

    #[must_use]
    pub fn can_emit_url(&self) -> bool {
        matches!(self, ResolutionState::Ready | ResolutionState::Resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_record_not_expired_when_fresh() {
        let rec = AvailabilityRecord::fresh(true, chrono::Duration::days(7));
        assert!(!rec.is_expired());
        assert!(rec.is_cached);
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(ResolutionState::Init.can_transition_to(&ResolutionState::Submitting));
        assert!(ResolutionState::Submitting.can_transition_to(&ResolutionState::Queued));
        assert!(ResolutionState::Queued.can_transition_to(&ResolutionState::Downloading));
        assert!(ResolutionState::Downloading.can_transition_to(&ResolutionState::Ready));
        assert!(ResolutionState::Ready.can_transition_to(&ResolutionState::Resolved));
    }

    #[test]
    fn any_state_can_move_to_error() {
        let err = ResolutionState::Error {
            kind: ErrorKind::Timeout,
            retry_after: Utc::now(),
        };
        assert!(ResolutionState::Queued.can_transition_to(&err));
        assert!(ResolutionState::Downloading.can_transition_to(&err));
    }

    #[test]
    fn ready_cannot_skip_back_to_queued() {
        assert!(!ResolutionState::Ready.can_transition_to(&ResolutionState::Queued));
    }

    #[test]
    fn only_ready_and_resolved_emit_url() {
        assert!(ResolutionState::Ready.can_emit_url());
        assert!(ResolutionState::Resolved.can_emit_url());
        assert!(!ResolutionState::Queued.can_emit_url());
        assert!(!ResolutionState::Init.can_emit_url());
    }
}
