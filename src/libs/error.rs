//! Error types for the schema engine.

use thiserror::Error;

/// Schema engine result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A physical object was missing where one was required, or present
    /// where none was expected.
    #[error("schema error: {0}")]
    Schema(String),

    /// Connection or statement failure reported by the catalog store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bad identifier, unknown field, or a record value that does not fit
    /// its field.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the "create an existing object / drop a missing one" family.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}
