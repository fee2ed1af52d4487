/// Errors that can occur during schema validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema file could not be loaded.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The value failed schema validation.
    #[error("{kind} validation failed for {target}: {message}")]
    ValidationFailed {
        target: String,
        kind: &'static str,
        message: String,
    },

    /// The schema text is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered for the given target.
    #[error("no {kind} schema registered for {target}")]
    NoSchema { target: String, kind: &'static str },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
