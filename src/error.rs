//! Error types for Agora operations.
//!
//! The first six variants are the domain taxonomy surfaced to users at the
//! request boundary. The remaining variants are infrastructure failures; they
//! are logged and reported as a generic server error.

use thiserror::Error;

/// Result type alias for Agora operations.
pub type Result<T> = std::result::Result<T, AgoraError>;

/// Main error type for Agora operations.
#[derive(Error, Debug)]
pub enum AgoraError {
    /// A forum, post, comment or member does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller has no authenticated session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but may not perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A structural invariant would be violated (comment linkage)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A forum with the same normalized name already exists
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// A required text field was blank
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Input validation errors (length limits, malformed ids)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage engine errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgoraError {
    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new unauthorized error.
    pub fn unauthorized<T: ToString>(msg: T) -> Self {
        Self::Unauthorized(msg.to_string())
    }

    /// Creates a new forbidden error.
    pub fn forbidden<T: ToString>(msg: T) -> Self {
        Self::Forbidden(msg.to_string())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state<T: ToString>(msg: T) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// Creates a new duplicate name error.
    pub fn duplicate_name<T: ToString>(msg: T) -> Self {
        Self::DuplicateName(msg.to_string())
    }

    /// Creates a new empty input error.
    pub fn empty_input<T: ToString>(msg: T) -> Self {
        Self::EmptyInput(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Returns true for failures the end user cannot act on.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_)
        )
    }

    /// Message safe to show to the end user.
    ///
    /// Internal failures collapse to a generic message so store details never
    /// leak past the request boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{} does not exist.", what),
            Self::Unauthorized(_) => "You must be logged in to do that.".to_string(),
            Self::Forbidden(msg) => msg.clone(),
            Self::InvalidState(msg) => msg.clone(),
            Self::DuplicateName(_) => "We already have a forum with that name.".to_string(),
            Self::EmptyInput(field) => format!("Please provide a {}.", field),
            Self::Validation(msg) => msg.clone(),
            Self::Config(msg) => msg.clone(),
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => {
                "Internal server error, please try again later.".to_string()
            }
        }
    }
}
