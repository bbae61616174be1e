//! Common error types for SingScore

use thiserror::Error;

/// Common result type for SingScore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SingScore services
#[derive(Error, Debug)]
pub enum Error {
    /// Config file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
