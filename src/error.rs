use thiserror::Error;

/// Main error type for maildex operations
#[derive(Error, Debug)]
pub enum MaildexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corruption at key '{key}': {reason}")]
    Corruption { key: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for maildex operations
pub type Result<T> = std::result::Result<T, MaildexError>;

impl MaildexError {
    /// Negative numeric code carried in API error bodies and process exit
    /// codes, errno-style.
    pub fn code(&self) -> i32 {
        match self {
            MaildexError::InvalidArgument(_) => -22,
            MaildexError::NotFound(_) => -2,
            MaildexError::Corruption { .. } => -74,
            MaildexError::Io(_) => -5,
            MaildexError::Storage(_) => -5,
            MaildexError::Serialization(_) => -74,
            MaildexError::Conflict(_) => -16,
            MaildexError::Internal(_) => -71,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MaildexError::NotFound(_))
    }

    /// Corruption error pointing at the key whose cell failed to decode.
    pub fn corruption(key: &[u8], reason: impl Into<String>) -> Self {
        MaildexError::Corruption {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: reason.into(),
        }
    }
}
