mod drive;

pub use drive::{DriveSource, DriveSourceConfig};

use crate::migrator::Result;
use async_trait::async_trait;
use std::path::Path;

/// Where migrated assets are fetched from
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Source identifier (e.g., "drive")
    fn id(&self) -> &'static str;

    /// Retrieve the file behind `file_id` and store it at `dest`.
    ///
    /// Returns the number of bytes written. On error nothing is left at
    /// `dest` from this call.
    async fn fetch(&self, file_id: &str, dest: &Path) -> Result<u64>;
}
