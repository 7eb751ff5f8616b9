use thiserror::Error;

/// Top-level error taxonomy for the aggregation/resolution engine.
///
/// Mirrors the kinds named in the error-handling design rather than a
/// generic catch-all: scraper failures are absorbed before they reach
/// this type (see [`crate::scraper::orchestrator`]), so what bubbles up
/// here is either a store/cache/config failure or a caller-facing
/// [`Error::Validation`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A value failed validation before it could ever reach the store
    /// (bad info-hash length, unparseable preference vector). This is
    /// the only variant that propagates to callers as a 4xx, per the
    /// error-handling design's propagation policy.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => Error::AlreadyExists(db_err.message().to_string()),
                Some("23503") => Error::NotFound("referenced resource not found".to_string()),
                Some("23514" | "23502") => {
                    Error::Validation("constraint check failed".to_string())
                }
                _ => Error::Database(err),
            },
            _ => Error::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error surface for the scraper plugin contract (§4.2).
///
/// `scrape` may only fail for unrecoverable configuration problems;
/// "no results" is `Ok(vec![])`, never an error.
#[derive(Error, Debug, Clone)]
pub enum ScrapeError {
    #[error("transient source error: {0}")]
    Transient(String),

    #[error("permanent source error: {0}")]
    Permanent(String),

    #[error("scraper misconfigured: {0}")]
    Configuration(String),

    #[error("circuit breaker open for this source")]
    CircuitOpen,

    #[error("rate limit deadline exceeded before a token became available")]
    RateLimited,

    #[error("scraper exceeded its deadline")]
    TimedOut,
}

impl ScrapeError {
    /// Whether the orchestrator should count this as worth logging as a
    /// distinct "permanent" skip vs. a transient backoff-and-forget.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, ScrapeError::Permanent(_) | ScrapeError::Configuration(_))
    }
}

/// Error surface for the debrid provider abstraction (§4.5, §7).
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("provider authentication failed or token expired")]
    Auth,

    #[error("provider quota or rate limit exceeded")]
    Quota,

    #[error("provider rejected the content (non-retryable)")]
    Content,

    #[error("provider request timed out")]
    Timeout,

    #[error("provider returned an unexpected response: {0}")]
    Protocol(String),

    #[error("network error talking to provider: {0}")]
    Network(String),
}

/// Error surface for the shared cache/availability layer (§4.7).
///
/// Per the propagation policy, callers treat every `CacheError` as a
/// cache miss rather than a hard failure — this type exists so call
/// sites can log it before doing so.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
