//! Core error types.

use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors.
///
/// None of these are transient. A mapping or unsupported-expression error
/// means the caller must fix the model or rewrite the predicate.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or inconsistent column, key or foreign-key metadata.
    #[error("mapping error on '{entity}': {message}")]
    Mapping { entity: String, message: String },

    /// Predicate shape outside the translatable subset.
    #[error("unsupported expression on '{entity}': {message}")]
    NotSupported { entity: String, message: String },

    /// A captured value could not be evaluated.
    #[error("evaluation error on '{entity}': {message}")]
    Evaluation { entity: String, message: String },

    /// Configuration or mapping document could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub fn mapping(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mapping {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn not_supported(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NotSupported {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn evaluation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Evaluation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// The entity type this error refers to, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            Error::Mapping { entity, .. }
            | Error::NotSupported { entity, .. }
            | Error::Evaluation { entity, .. } => Some(entity),
            Error::Config(_) => None,
        }
    }
}
