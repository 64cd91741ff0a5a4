/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that end a pass. Per-item problems use [`crate::ExtractError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("API error (status {status}) from {url}: {body}")]
    Api {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed {stage} response: {reason}")]
    Malformed { stage: &'static str, reason: String },

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ArchiveError {
    /// Local storage failures; these abort a pass even inside nested fetches.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn malformed(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            stage,
            reason: reason.into(),
        }
    }
}
