use thiserror::Error;

/// Unified error type for the relay front
#[derive(Error, Debug)]
pub enum FrontError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // I/O errors (CA bundle / config persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors (proxy config persistence)
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    // Collaborator errors
    #[error("TLS trust context error: {0}")]
    TrustContext(String),
}

/// Result type alias for relay front operations
pub type Result<T> = std::result::Result<T, FrontError>;

impl FrontError {
    /// Check if this error left previously applied trust state in effect
    ///
    /// A failed CA bundle write or trust reload never clobbers the prior
    /// bundle; callers may keep using the front with the old trust anchors.
    pub fn preserves_trust_state(&self) -> bool {
        matches!(self, FrontError::Io(_) | FrontError::TrustContext(_))
    }
}

// Convert from URL parse errors (proxy config URLs)
impl From<url::ParseError> for FrontError {
    fn from(err: url::ParseError) -> Self {
        FrontError::InvalidConfig(err.to_string())
    }
}
