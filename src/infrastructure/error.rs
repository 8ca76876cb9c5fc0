use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workout plan file not found at '{}'", path.display())]
    NotFound { path: PathBuf },
    #[error("could not parse '{}'; please ensure it is valid JSON ({message})", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("invalid day name '{0}'")]
    InvalidDay(String),
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("'{}' not found and no usable cached token", .0.display())]
    CredentialsMissing(PathBuf),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("credential store error: {0}")]
    Credential(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
