use thiserror::Error;

/// Centralized error types for the application
///
/// Errors that are not tied to a single batch end up here. Uses `thiserror`
/// for automatic error conversion and display formatting.
///
/// # Example
///
/// ```no_run
/// use tapedeck::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive writing errors
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid or unparsable configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A background `spawn_blocking` job panicked or was cancelled.
impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Io(std::io::Error::other(format!("blocking task failed: {}", err)))
    }
}
