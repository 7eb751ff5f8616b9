//! The data model (§3): identifiable works, their playable candidates,
//! preference vectors, and the availability-cache records layered on
//! top of the shared cache.

pub mod cache_entry;
pub mod id;
pub mod media;
pub mod preferences;
pub mod stream;

pub use cache_entry::{AvailabilityRecord, ErrorKind, ResolutionState};
pub use id::{generate_token, ExternalId, InfoHash, InfoHashError, MediaId};
pub use media::{Episode, Media, MediaKind, Season};
pub use preferences::{NameFilterMode, SortDirection, SortKey, SortRule, StreamNameFilter, UserPreferenceVector};
pub use stream::{FileMediaLink, MediaFileType, Stream, StreamFile, StreamPayload};
