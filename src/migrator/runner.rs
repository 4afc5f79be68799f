//! Member image migration - pull drive-hosted images into local storage

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    AssetSource, DriveSource, DriveSourceConfig, Member, MemberCollection, MigrateError, Result,
    ShareLink,
};

/// Migrator configuration
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Directory the downloaded assets are written to
    pub output_dir: PathBuf,
    /// Prefix of the rewritten image reference: {url_prefix}/{id}.{ext}
    pub url_prefix: String,
    /// Substring that marks an image reference as a drive link
    pub host_marker: String,
    /// Extension given to every downloaded asset
    pub extension: String,
    /// Classify and log only; no downloads, no rewrite
    pub dry_run: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("client/public/members"),
            url_prefix: "/members".to_string(),
            host_marker: "drive.google.com".to_string(),
            extension: "jpg".to_string(),
            dry_run: false,
        }
    }
}

/// What happened to a single member record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Image is not a drive link; untouched
    NotRemote,
    /// Drive link without a derivable file id; untouched
    Unextractable,
    /// Dry run: would have downloaded `file_id` to `target`
    Planned { file_id: String, target: PathBuf },
    /// Downloaded and the record now points at `image`
    Migrated {
        file_id: String,
        image: String,
        bytes: u64,
    },
    /// Download failed; untouched
    Failed { file_id: String, error: String },
}

/// Counts for a migration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    pub total: usize,
    pub updated: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_remote: usize,
    pub unextractable: usize,
    pub planned: usize,
}

impl MigrationSummary {
    /// Records left alone because they had no usable drive link
    pub fn skipped(&self) -> usize {
        self.not_remote + self.unextractable
    }

    fn record(&mut self, outcome: &RecordOutcome) {
        self.total += 1;
        match outcome {
            RecordOutcome::NotRemote => self.not_remote += 1,
            RecordOutcome::Unextractable => self.unextractable += 1,
            RecordOutcome::Planned { .. } => self.planned += 1,
            RecordOutcome::Migrated { .. } => {
                self.updated += 1;
                self.succeeded += 1;
            }
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Moves member images from drive links to local files
pub struct Migrator {
    config: MigratorConfig,
    source: Arc<dyn AssetSource>,
}

impl Migrator {
    /// Create a migrator fetching through `source`
    pub fn new<S: AssetSource + 'static>(config: MigratorConfig, source: S) -> Self {
        Self {
            config,
            source: Arc::new(source),
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Migrate the collection stored at `collection_path`.
    ///
    /// The file is rewritten once, at the end, and only if at least one
    /// record changed. Per-record failures end up in the summary.
    pub async fn migrate(&self, collection_path: &Path) -> Result<MigrationSummary> {
        let mut collection = MemberCollection::load(collection_path)?;

        info!(
            "Found {} members in {}. Starting migration...",
            collection.len(),
            collection.path().display()
        );

        let summary = self.migrate_collection(&mut collection).await?;

        if summary.updated > 0 {
            collection.save()?;
            info!(
                "Updated {} records in {}",
                summary.updated,
                collection.path().display()
            );
        } else {
            info!("No changes were made to {}", collection.path().display());
        }

        Ok(summary)
    }

    /// Migrate an already loaded collection in place, without saving it
    pub async fn migrate_collection(
        &self,
        collection: &mut MemberCollection,
    ) -> Result<MigrationSummary> {
        if !self.config.dry_run {
            tokio::fs::create_dir_all(&self.config.output_dir).await?;
        }

        let mut summary = MigrationSummary::default();

        for member in collection.members_mut() {
            let outcome = self.migrate_member(member).await;
            summary.record(&outcome);
        }

        Ok(summary)
    }

    /// Run one record through classify, download and rewrite
    pub async fn migrate_member(&self, member: &mut Member) -> RecordOutcome {
        let file_id = match ShareLink::classify(member.image(), &self.config.host_marker) {
            ShareLink::NotRemote => {
                debug!("Skipping {}: not a drive link", member.name());
                return RecordOutcome::NotRemote;
            }
            ShareLink::Unextractable => {
                warn!(
                    "Skipping {}: {}",
                    member.name(),
                    MigrateError::Extraction(member.image().to_string())
                );
                return RecordOutcome::Unextractable;
            }
            ShareLink::Remote { file_id } => file_id,
        };

        let file_name = self.asset_file_name(member);
        let target = self.config.output_dir.join(&file_name);

        if self.config.dry_run {
            info!(
                "[DRY RUN] Would download {} for {} ({}) -> {:?}",
                file_id,
                member.name(),
                member.id(),
                target
            );
            return RecordOutcome::Planned { file_id, target };
        }

        info!("Processing {} ({})...", member.name(), member.id());

        match self.source.fetch(&file_id, &target).await {
            Ok(bytes) => {
                let image = format!(
                    "{}/{}",
                    self.config.url_prefix.trim_end_matches('/'),
                    file_name
                );
                info!("Saved {} ({} bytes) as {}", file_id, bytes, image);
                member.set_image(image.clone());

                RecordOutcome::Migrated {
                    file_id,
                    image,
                    bytes,
                }
            }
            Err(e) => {
                warn!(
                    "Failed to download image for {} ({}) from {}: {}. Record not updated.",
                    member.name(),
                    member.id(),
                    self.source.id(),
                    e
                );

                RecordOutcome::Failed {
                    file_id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Asset file name: the member id plus the configured extension
    fn asset_file_name(&self, member: &Member) -> String {
        format!(
            "{}.{}",
            sanitize_file_stem(&member.id()),
            self.config.extension.trim_start_matches('.')
        )
    }
}

/// Migrate `collection_path` through the default drive source
pub async fn migrate(
    collection_path: &Path,
    output_dir: impl Into<PathBuf>,
    url_prefix: impl Into<String>,
) -> Result<MigrationSummary> {
    let config = MigratorConfig {
        output_dir: output_dir.into(),
        url_prefix: url_prefix.into(),
        ..MigratorConfig::default()
    };
    let source = DriveSource::new(DriveSourceConfig::default())?;

    Migrator::new(config, source).migrate(collection_path).await
}

/// Make a member id safe to use as a file name
fn sanitize_file_stem(id: &str) -> String {
    // Characters not allowed in filenames on various systems
    const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let stem: String = id
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();

    // ".." would climb out of the output directory
    match stem.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn member(value: serde_json::Value) -> Member {
        Member::try_from(value).unwrap()
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("42"), "42");
        assert_eq!(sanitize_file_stem("cs-2027-07"), "cs-2027-07");
        assert_eq!(sanitize_file_stem("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_file_stem(".."), "_");
        assert_eq!(sanitize_file_stem(""), "_");
        assert_eq!(sanitize_file_stem(" 7"), " 7");
        assert_eq!(sanitize_file_stem("Ada Lovelace "), "Ada Lovelace ");
    }

    #[test]
    fn test_asset_file_name() {
        struct NoSource;

        #[async_trait::async_trait]
        impl AssetSource for NoSource {
            fn id(&self) -> &'static str {
                "none"
            }

            async fn fetch(&self, _file_id: &str, _dest: &Path) -> Result<u64> {
                Ok(0)
            }
        }

        let migrator = Migrator::new(
            MigratorConfig {
                extension: ".png".to_string(),
                ..MigratorConfig::default()
            },
            NoSource,
        );

        let m = member(json!({"id": 12, "name": "Ada", "image": ""}));
        assert_eq!(migrator.asset_file_name(&m), "12.png");

        let padded = member(json!({"id": " 7", "name": "Kai", "image": ""}));
        assert_eq!(migrator.asset_file_name(&padded), " 7.png");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = MigrationSummary::default();
        summary.record(&RecordOutcome::NotRemote);
        summary.record(&RecordOutcome::Unextractable);
        summary.record(&RecordOutcome::Migrated {
            file_id: "Q1".to_string(),
            image: "/members/1.jpg".to_string(),
            bytes: 10,
        });
        summary.record(&RecordOutcome::Failed {
            file_id: "Q2".to_string(),
            error: "timeout".to_string(),
        });

        assert_eq!(summary.total, 4);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped(), 2);
    }
}
