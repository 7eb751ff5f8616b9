//! Metadata Enricher (§4.7, §6): a scraper-like component specialized
//! for identity rather than streams. Wraps read-only HTTP JSON lookups
//! against IMDb/TMDB/TVDB/Jikan/Kitsu-style APIs and merges their
//! answers into a `Media`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{KeyBuilder, KvCache};
use crate::error::ScrapeError;
use crate::models::{ExternalId, Media, MediaKind};

/// What a single metadata source can contribute. Every field is
/// optional: a source that only does ratings (e.g. a ratings-only
/// aggregator) leaves the rest `None`/empty and still participates in
/// the merge.
#[derive(Debug, Clone, Default)]
pub struct MetadataFragment {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub end_year: Option<i32>,
    pub description: Option<String>,
    pub genres: HashSet<String>,
    pub rating: Option<f64>,
    /// role ("poster", "backdrop", "logo", ...) -> url
    pub images: HashMap<String, String>,
    pub aka_titles: HashSet<String>,
}

/// A read-only identity source (§6: "From metadata providers
/// (IMDb/TMDB/TVDB/Jikan/Kitsu)").
#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    /// `None` means "this source has nothing for this id", not an
    /// error; mirrors the scraper contract's "no results is Ok", since a
    /// title commonly exists in only one or two of the configured
    /// sources.
    async fn lookup(&self, external_id: &ExternalId, kind: MediaKind) -> Result<Option<MetadataFragment>, ScrapeError>;

    fn cache_ttl(&self) -> Duration;
}

/// Merges every configured [`MetadataSource`]'s answer into one `Media`.
/// Scalar fields take the first source (in registration order) that
/// supplies a value; set/map fields union across all sources.
pub struct MetadataEnricher {
    sources: Vec<Arc<dyn MetadataSource>>,
    kv: Arc<dyn KvCache>,
    keys: KeyBuilder,
}

impl MetadataEnricher {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>, kv: Arc<dyn KvCache>, keys: KeyBuilder) -> Self {
        Self { sources, kv, keys }
    }

    /// Resolve `external_id` into a `Media`, querying every source
    /// (cache-fronted, each under its own `meta:{provider}:{id}` key)
    /// and merging the fragments. `fallback_title`/`fallback_year` seed
    /// the result when no source answers, so a never-enriched id still
    /// produces a usable `Media` for the Stream Store to link against.
    pub async fn enrich(
        &self,
        external_id: &ExternalId,
        kind: MediaKind,
        fallback_title: &str,
        fallback_year: Option<i32>,
    ) -> Media {
        let mut media = Media::new(external_id.clone(), kind, fallback_title.to_string(), fallback_year);

        for source in &self.sources {
            match self.lookup_cached(source.as_ref(), external_id, kind).await {
                Ok(Some(fragment)) => merge_fragment(&mut media, source.name(), fragment),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(source = source.name(), %err, "metadata source lookup failed, skipping");
                }
            }
        }

        media
    }

    async fn lookup_cached(
        &self,
        source: &dyn MetadataSource,
        external_id: &ExternalId,
        kind: MediaKind,
    ) -> Result<Option<MetadataFragment>, ScrapeError> {
        let key = self.keys.metadata(source.name(), external_id.as_str());

        if let Ok(Some(bytes)) = self.kv.get(&key).await {
            if let Ok(cached) = serde_json::from_slice::<WireFragment>(&bytes) {
                return Ok(Some(cached.into_fragment()));
            }
        }

        let fragment = source.lookup(external_id, kind).await?;

        if let Some(fragment) = &fragment {
            let wire = WireFragment::from_fragment(fragment);
            if let Ok(bytes) = serde_json::to_vec(&wire) {
                let ttl = source.cache_ttl().as_secs();
                if let Err(err) = self.kv.set(&key, &bytes, Some(ttl)).await {
                    tracing::warn!(source = source.name(), %err, "metadata cache write failed");
                }
            }
        }

        Ok(fragment)
    }
}

fn merge_fragment(media: &mut Media, source_name: &str, fragment: MetadataFragment) {
    if let Some(title) = fragment.title {
        if media.title.is_empty() {
            media.title = title;
        }
    }
    if media.year.is_none() {
        media.year = fragment.year;
    }
    if media.end_year.is_none() {
        media.end_year = fragment.end_year;
    }
    if media.description.is_none() {
        media.description = fragment.description;
    }
    media.genres.extend(fragment.genres);
    media.images.extend(fragment.images);
    media.aka_titles.extend(fragment.aka_titles);
    if let Some(rating) = fragment.rating {
        media.ratings.insert(source_name.to_string(), rating);
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WireFragment {
    title: Option<String>,
    year: Option<i32>,
    end_year: Option<i32>,
    description: Option<String>,
    genres: Vec<String>,
    rating: Option<f64>,
    images: HashMap<String, String>,
    aka_titles: Vec<String>,
}

impl WireFragment {
    fn from_fragment(f: &MetadataFragment) -> Self {
        Self {
            title: f.title.clone(),
            year: f.year,
            end_year: f.end_year,
            description: f.description.clone(),
            genres: f.genres.iter().cloned().collect(),
            rating: f.rating,
            images: f.images.clone(),
            aka_titles: f.aka_titles.iter().cloned().collect(),
        }
    }

    fn into_fragment(self) -> MetadataFragment {
        MetadataFragment {
            title: self.title,
            year: self.year,
            end_year: self.end_year,
            description: self.description,
            genres: self.genres.into_iter().collect(),
            rating: self.rating,
            images: self.images,
            aka_titles: self.aka_titles.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryKvCache;

    struct StubSource {
        source_name: &'static str,
        fragment: Option<MetadataFragment>,
    }

    #[async_trait]
    impl MetadataSource for StubSource {
        fn name(&self) -> &str {
            self.source_name
        }

        async fn lookup(
            &self,
            _external_id: &ExternalId,
            _kind: MediaKind,
        ) -> Result<Option<MetadataFragment>, ScrapeError> {
            Ok(self.fragment.clone())
        }

        fn cache_ttl(&self) -> Duration {
            Duration::from_secs(86400)
        }
    }

    #[tokio::test]
    async fn first_source_title_wins_but_genres_union() {
        let primary = Arc::new(StubSource {
            source_name: "imdb",
            fragment: Some(MetadataFragment {
                title: Some("The Matrix".to_string()),
                year: Some(1999),
                genres: ["Action".to_string()].into_iter().collect(),
                ..Default::default()
            }),
        });
        let secondary = Arc::new(StubSource {
            source_name: "tmdb",
            fragment: Some(MetadataFragment {
                title: Some("Matrix (alt title)".to_string()),
                genres: ["Sci-Fi".to_string()].into_iter().collect(),
                ..Default::default()
            }),
        });

        let enricher = MetadataEnricher::new(vec![primary, secondary], Arc::new(InMemoryKvCache::new()), KeyBuilder::new("mf:"));
        let media = enricher.enrich(&ExternalId("tt0133093".to_string()), MediaKind::Movie, "", None).await;

        assert_eq!(media.title, "The Matrix");
        assert!(media.genres.contains("Action"));
        assert!(media.genres.contains("Sci-Fi"));
    }

    #[tokio::test]
    async fn falls_back_to_caller_supplied_title_when_no_source_answers() {
        let enricher = MetadataEnricher::new(vec![], Arc::new(InMemoryKvCache::new()), KeyBuilder::new("mf:"));
        let media = enricher
            .enrich(&ExternalId("tt9999999".to_string()), MediaKind::Movie, "Unknown Title", Some(2024))
            .await;

        assert_eq!(media.title, "Unknown Title");
        assert_eq!(media.year, Some(2024));
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let source = Arc::new(StubSource {
            source_name: "imdb",
            fragment: Some(MetadataFragment { title: Some("Cached".to_string()), ..Default::default() }),
        });
        let kv = Arc::new(InMemoryKvCache::new());
        let enricher = MetadataEnricher::new(vec![source], kv, KeyBuilder::new("mf:"));
        let id = ExternalId("tt1111111".to_string());

        let first = enricher.enrich(&id, MediaKind::Movie, "", None).await;
        let second = enricher.enrich(&id, MediaKind::Movie, "", None).await;
        assert_eq!(first.title, second.title);
    }
}
