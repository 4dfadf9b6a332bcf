//! Domain error types.
//!
//! Policy outcomes (signal rejections, `can_open` refusals) are ordinary values elsewhere in the
//! domain. `TraderError` is reserved for conditions the engine cannot decide around: storage
//! failures, bad configuration, and broken preconditions.

/// Top-level error type for probtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("snapshot version {found} is newer than supported version {supported}")]
    SnapshotVersion { found: u32, supported: u32 },

    #[error("trade journal error: {reason}")]
    Journal { reason: String },

    #[error("market data error for {key}: {reason}")]
    MarketData { key: String, reason: String },

    #[error("execution error for {key}: {reason}")]
    Execution { key: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("position already open for {key}")]
    DuplicatePosition { key: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Persistence { .. }
            | TraderError::Database { .. }
            | TraderError::SnapshotVersion { .. }
            | TraderError::Serialization(_) => 3,
            TraderError::Journal { .. } => 4,
            TraderError::MarketData { .. }
            | TraderError::Execution { .. }
            | TraderError::DuplicatePosition { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
