//! Configuration, errors, logging, metrics, and the HTTP front end

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod process;
pub mod types;
pub mod web_server;

// Re-exports for convenience
pub use config::Config;
pub use error::AppError;
pub use logging::{init_logger, log_tooling_configuration};
pub use types::SourceIdentifier;
