use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Crate-wide error taxonomy.
///
/// Variants map onto the error kinds a caller must branch on (§7): which
/// ones are retried locally by an adapter, which abort a single campaign or
/// platform, and which abort the whole tick. `CoreError` itself carries no
/// retry logic — see [`crate::adapters::rate_limit`] for that.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth expired for platform {0}")]
    AuthExpired(String),

    #[error("rate limited by platform {platform}, retry after {retry_after_secs}s")]
    RateLimited { platform: String, retry_after_secs: u64 },

    #[error("transient adapter error on {platform}: {message}")]
    Transient { platform: String, message: String },

    #[error("campaign not found: {0:?}")]
    NotFound(crate::domain::CampaignRef),

    #[error("platform unavailable: {0}")]
    Unavailable(String),

    #[error("analyst request timed out after {0:?}")]
    AnalystTimeout(std::time::Duration),

    #[error("tick deadline of {0:?} elapsed before the tick reached AUDITING")]
    TickDeadlineExceeded(std::time::Duration),

    #[error("analyst response malformed: {0}")]
    AnalystMalformed(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        CoreError::Config(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        CoreError::Internal(msg.into())
    }

    /// Whether a fresh attempt of the same operation might succeed.
    ///
    /// `RATE_LIMITED` and `TRANSIENT` are retryable by construction (§7);
    /// everything else requires an input or state change first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::RateLimited { .. } | CoreError::Transient { .. })
    }
}
