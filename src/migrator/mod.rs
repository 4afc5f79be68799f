mod link;
mod runner;
mod source;
mod store;


pub use link::{ShareLink, extract_file_id};
pub use runner::{MigrationSummary, Migrator, MigratorConfig, RecordOutcome, migrate};
pub use source::{AssetSource, DriveSource, DriveSourceConfig};
pub use store::{Member, MemberCollection};

/// Migrator result type
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Migrator error types
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not extract a file id from {0}")]
    Extraction(String),

    #[error("Retrieval failed: {status} - {message}")]
    Retrieval { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
