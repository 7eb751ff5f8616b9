//! Stream Store (§4.6): append-mostly persistence for [`Stream`], keyed
//! by info-hash, with the media/season/episode read paths and the
//! "blocked hash stays blocked" write-time guard. Also home to
//! `MediaStore`, the thin identity-side counterpart that hands the
//! Metadata Enricher's output a durable `MediaId` to link streams
//! against.

use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{ExternalId, InfoHash, Media, MediaId, MediaKind, Stream, StreamPayload};

/// Which branch [`StreamStore::upsert`] took, used by the scheduled
/// ingest path to tally a [`crate::scraper::ScrapeMetrics`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    New,
    Updated,
    Blocked,
}

/// Find-or-create access to the `media` table (§4.6/§4.7: the Metadata
/// Enricher produces a `Media` value with no id; this is where it gets
/// one, keyed on `(external_id, kind)` per §3's uniqueness note).
#[derive(Clone)]
pub struct MediaStore {
    pool: PgPool,
}

impl MediaStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up an existing row by `(external_id, kind)`, or insert
    /// `media` and return it with its freshly assigned id.
    pub async fn find_or_create(&self, media: Media) -> Result<Media> {
        if let Some(existing) = self.find_by_external_id(&media.external_id, media.kind).await? {
            return Ok(existing);
        }

        let mut tx = self.pool.begin().await?;
        let genres = set_to_vec(&media.genres);
        let aka_titles = set_to_vec(&media.aka_titles);
        let ratings_json = serde_json::to_value(&media.ratings)?;
        let images_json = serde_json::to_value(&media.images)?;

        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO media (
                external_id, kind, title, year, end_year, description,
                genres, ratings, images, aka_titles, created_at, updated_at, total_streams
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,0)
            ON CONFLICT (external_id, kind) DO UPDATE SET title = EXCLUDED.title
            RETURNING id
            ",
        )
        .bind(media.external_id.as_str())
        .bind(media.kind.as_str())
        .bind(&media.title)
        .bind(media.year)
        .bind(media.end_year)
        .bind(&media.description)
        .bind(genres)
        .bind(ratings_json)
        .bind(images_json)
        .bind(aka_titles)
        .bind(media.created_at)
        .bind(media.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Media { id: MediaId::new(id), ..media })
    }

    async fn find_by_external_id(&self, external_id: &ExternalId, kind: MediaKind) -> Result<Option<Media>> {
        let row = sqlx::query(
            "SELECT * FROM media WHERE external_id = $1 AND kind = $2",
        )
        .bind(external_id.as_str())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_media).transpose()
    }

    /// Every known media row. Backs a scheduled scrape's `scrape_all`
    /// pass, which re-checks the whole catalog rather than just recent
    /// additions.
    pub async fn list_all(&self) -> Result<Vec<Media>> {
        let rows = sqlx::query("SELECT * FROM media ORDER BY id").fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_media).collect()
    }

    /// The `limit` most recently touched media rows. Backs a scheduled
    /// scrape's incremental pass.
    pub async fn list_recently_active(&self, limit: i64) -> Result<Vec<Media>> {
        let rows = sqlx::query("SELECT * FROM media ORDER BY updated_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_media).collect()
    }
}

fn row_to_media(row: PgRow) -> Result<Media> {
    let external_id: String = row.try_get("external_id")?;
    let kind_str: String = row.try_get("kind")?;
    let genres: Vec<String> = row.try_get("genres")?;
    let aka_titles: Vec<String> = row.try_get("aka_titles")?;
    let ratings_json: serde_json::Value = row.try_get("ratings")?;
    let images_json: serde_json::Value = row.try_get("images")?;
    let id: i64 = row.try_get("id")?;

    Ok(Media {
        id: MediaId::new(id),
        external_id: ExternalId(external_id),
        kind: parse_kind(&kind_str)?,
        title: row.try_get("title")?,
        year: row.try_get("year")?,
        end_year: row.try_get("end_year")?,
        description: row.try_get("description")?,
        genres: genres.into_iter().collect(),
        ratings: serde_json::from_value(ratings_json)?,
        images: serde_json::from_value(images_json)?,
        aka_titles: aka_titles.into_iter().collect(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_kind(raw: &str) -> Result<MediaKind> {
    Ok(match raw {
        "series" => MediaKind::Series,
        "tv" => MediaKind::Tv,
        "event" => MediaKind::Event,
        _ => MediaKind::Movie,
    })
}

#[derive(Clone)]
pub struct StreamStore {
    pool: PgPool,
}

impl StreamStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `upsert(stream)` (§4.6 write contract): merge mutable fields into
    /// an existing row, or insert a new one and bump the owning media's
    /// `total_streams`/`last_stream_added` aggregates.
    ///
    /// Per §4.6's "one blocked info-hash stays blocked" rule, a stream
    /// whose existing row is blocked is discarded here rather than
    /// merged — the caller gets back the unchanged blocked row.
    pub async fn upsert(&self, stream: Stream, media_id: MediaId) -> Result<(Stream, UpsertOutcome)> {
        let mut tx = self.pool.begin().await?;

        let existing = fetch_by_hash(&mut tx, &stream.info_hash).await?;

        let (result, outcome) = match existing {
            Some(mut current) if current.is_blocked => {
                tracing::debug!(info_hash = %stream.info_hash, "discarding ingest of blocked stream");
                (current, UpsertOutcome::Blocked)
            }
            Some(mut current) => {
                current.merge_from(&stream);
                update_stream(&mut tx, &current).await?;
                (current, UpsertOutcome::Updated)
            }
            None => {
                insert_stream(&mut tx, &stream).await?;
                link_media(&mut tx, &stream.info_hash, media_id).await?;
                bump_media_aggregates(&mut tx, media_id, 1).await?;
                (stream, UpsertOutcome::New)
            }
        };

        tx.commit().await?;
        Ok((result, outcome))
    }

    /// Admin action: blocks a stream (soft-delete) and decrements the
    /// aggregates of every media it was linked to.
    pub async fn block(&self, info_hash: &InfoHash) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let media_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT media_id FROM stream_media_links WHERE info_hash = $1",
        )
        .bind(info_hash.as_str())
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("UPDATE streams SET is_blocked = true, updated_at = now() WHERE info_hash = $1")
            .bind(info_hash.as_str())
            .execute(&mut *tx)
            .await?;

        for media_id in media_ids {
            bump_media_aggregates(&mut tx, MediaId::new(media_id), -1).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// `streams_for(media_id, kind, season?, episode?)` (§4.6 read
    /// contract): direct lookup for movies/TV; for series with
    /// season+episode, join through `FileMediaLink`, falling back to
    /// media-level torrents whose parsed `seasons` contains the
    /// requested season when no file-level link exists.
    pub async fn streams_for(
        &self,
        media_id: MediaId,
        kind: MediaKind,
        season: Option<u32>,
        episode: Option<u32>,
    ) -> Result<Vec<Stream>> {
        let mut conn = self.pool.acquire().await?;

        if !matches!(kind, MediaKind::Series) || season.is_none() {
            return fetch_linked(&mut conn, media_id).await;
        }

        let season = season.expect("checked above");
        let file_linked = fetch_file_linked(&mut conn, media_id, season, episode).await?;
        if !file_linked.is_empty() {
            return Ok(file_linked);
        }

        fetch_season_fallback(&mut conn, media_id, season).await
    }
}

async fn fetch_by_hash<'e, E>(executor: E, info_hash: &InfoHash) -> Result<Option<Stream>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let row = sqlx::query(STREAM_COLUMNS_SELECT_BY_HASH)
        .bind(info_hash.as_str())
        .fetch_optional(executor)
        .await?;
    row.map(row_to_stream).transpose()
}

async fn fetch_linked<'e, E>(executor: E, media_id: MediaId) -> Result<Vec<Stream>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let rows = sqlx::query(
        "SELECT s.* FROM streams s
         JOIN stream_media_links l ON l.info_hash = s.info_hash
         WHERE l.media_id = $1 AND s.is_blocked = false AND s.is_active = true",
    )
    .bind(media_id.0)
    .fetch_all(executor)
    .await?;
    rows.into_iter().map(row_to_stream).collect()
}

async fn fetch_file_linked<'e, E>(
    executor: E,
    media_id: MediaId,
    season: u32,
    episode: Option<u32>,
) -> Result<Vec<Stream>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let rows = sqlx::query(
        "SELECT DISTINCT s.* FROM streams s
         JOIN file_media_links f ON f.info_hash = s.info_hash
         WHERE f.media_id = $1 AND f.season_number = $2
           AND ($3::int IS NULL OR f.episode_number = $3)
           AND s.is_blocked = false AND s.is_active = true",
    )
    .bind(media_id.0)
    .bind(season as i32)
    .bind(episode.map(|e| e as i32))
    .fetch_all(executor)
    .await?;
    rows.into_iter().map(row_to_stream).collect()
}

async fn fetch_season_fallback<'e, E>(executor: E, media_id: MediaId, season: u32) -> Result<Vec<Stream>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let rows = sqlx::query(
        "SELECT s.* FROM streams s
         JOIN stream_media_links l ON l.info_hash = s.info_hash
         WHERE l.media_id = $1 AND $2 = ANY(s.seasons)
           AND s.is_blocked = false AND s.is_active = true",
    )
    .bind(media_id.0)
    .bind(season as i32)
    .fetch_all(executor)
    .await?;
    rows.into_iter().map(row_to_stream).collect()
}

async fn insert_stream<'e, E>(executor: E, stream: &Stream) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let payload_json = serde_json::to_value(&stream.payload)?;
    sqlx::query(
        r"
        INSERT INTO streams (
            info_hash, display_name, sources, payload, size_bytes, resolution, quality,
            audio_formats, hdr_formats, channels, languages, is_remux, is_proper, is_repack,
            is_extended, is_dubbed, is_subbed, is_complete, seeders, trackers,
            created_at, updated_at, is_active, is_blocked, vote_score, playback_count, seasons
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24,$25,$26,$27)
        ",
    )
    .bind(stream.info_hash.as_str())
    .bind(&stream.display_name)
    .bind(&stream.sources)
    .bind(payload_json)
    .bind(stream.size_bytes as i64)
    .bind(&stream.resolution)
    .bind(&stream.quality)
    .bind(set_to_vec(&stream.audio_formats))
    .bind(set_to_vec(&stream.hdr_formats))
    .bind(set_to_vec(&stream.channels))
    .bind(set_to_vec(&stream.languages))
    .bind(stream.is_remux)
    .bind(stream.is_proper)
    .bind(stream.is_repack)
    .bind(stream.is_extended)
    .bind(stream.is_dubbed)
    .bind(stream.is_subbed)
    .bind(stream.is_complete)
    .bind(stream.seeders.map(|s| s as i32))
    .bind(&stream.trackers)
    .bind(stream.created_at)
    .bind(stream.updated_at)
    .bind(stream.is_active)
    .bind(stream.is_blocked)
    .bind(stream.vote_score)
    .bind(stream.playback_count as i64)
    .bind(set_to_i32_vec(&stream.seasons))
    .execute(executor)
    .await?;
    Ok(())
}

async fn update_stream<'e, E>(executor: E, stream: &Stream) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r"
        UPDATE streams SET
            sources = $2, size_bytes = $3, languages = $4, trackers = $5,
            seeders = $6, seasons = $7, updated_at = $8
        WHERE info_hash = $1
        ",
    )
    .bind(stream.info_hash.as_str())
    .bind(&stream.sources)
    .bind(stream.size_bytes as i64)
    .bind(set_to_vec(&stream.languages))
    .bind(&stream.trackers)
    .bind(stream.seeders.map(|s| s as i32))
    .bind(set_to_i32_vec(&stream.seasons))
    .bind(stream.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn link_media<'e, E>(executor: E, info_hash: &InfoHash, media_id: MediaId) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "INSERT INTO stream_media_links (info_hash, media_id) VALUES ($1, $2)
         ON CONFLICT (info_hash, media_id) DO NOTHING",
    )
    .bind(info_hash.as_str())
    .bind(media_id.0)
    .execute(executor)
    .await?;
    Ok(())
}

async fn bump_media_aggregates<'e, E>(executor: E, media_id: MediaId, delta: i32) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        "UPDATE media SET total_streams = GREATEST(0, total_streams + $2), last_stream_added = now()
         WHERE id = $1",
    )
    .bind(media_id.0)
    .bind(delta)
    .execute(executor)
    .await?;
    Ok(())
}

fn set_to_vec(set: &HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.iter().cloned().collect();
    v.sort();
    v
}

fn set_to_i32_vec(set: &HashSet<u32>) -> Vec<i32> {
    let mut v: Vec<i32> = set.iter().map(|n| *n as i32).collect();
    v.sort_unstable();
    v
}

const STREAM_COLUMNS_SELECT_BY_HASH: &str = "SELECT * FROM streams WHERE info_hash = $1";

fn row_to_stream(row: PgRow) -> Result<Stream> {
    let info_hash: String = row.try_get("info_hash")?;
    let payload_json: serde_json::Value = row.try_get("payload")?;
    let payload: StreamPayload = serde_json::from_value(payload_json)?;
    let audio_formats: Vec<String> = row.try_get("audio_formats")?;
    let hdr_formats: Vec<String> = row.try_get("hdr_formats")?;
    let channels: Vec<String> = row.try_get("channels")?;
    let languages: Vec<String> = row.try_get("languages")?;
    let seasons: Vec<i32> = row.try_get("seasons")?;
    let seeders: Option<i32> = row.try_get("seeders")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let playback_count: i64 = row.try_get("playback_count")?;

    Ok(Stream {
        info_hash: InfoHash::parse(&info_hash).map_err(|e| crate::error::Error::DataIntegrity(e.to_string()))?,
        display_name: row.try_get("display_name")?,
        sources: row.try_get("sources")?,
        payload,
        size_bytes: size_bytes.max(0) as u64,
        resolution: row.try_get("resolution")?,
        quality: row.try_get("quality")?,
        audio_formats: audio_formats.into_iter().collect(),
        hdr_formats: hdr_formats.into_iter().collect(),
        channels: channels.into_iter().collect(),
        languages: languages.into_iter().collect(),
        is_remux: row.try_get("is_remux")?,
        is_proper: row.try_get("is_proper")?,
        is_repack: row.try_get("is_repack")?,
        is_extended: row.try_get("is_extended")?,
        is_dubbed: row.try_get("is_dubbed")?,
        is_subbed: row.try_get("is_subbed")?,
        is_complete: row.try_get("is_complete")?,
        seeders: seeders.map(|s| s.max(0) as u32),
        trackers: row.try_get("trackers")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_active: row.try_get("is_active")?,
        is_blocked: row.try_get("is_blocked")?,
        vote_score: row.try_get("vote_score")?,
        playback_count: playback_count.max(0) as u64,
        seasons: seasons.into_iter().map(|s| s.max(0) as u32).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_to_vec_is_sorted_for_stable_comparisons() {
        let set: HashSet<String> = ["b".to_string(), "a".to_string()].into_iter().collect();
        assert_eq!(set_to_vec(&set), vec!["a".to_string(), "b".to_string()]);
    }
}
