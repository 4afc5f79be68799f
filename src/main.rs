use anyhow::{Context, Result};
use tracing::info;

use member_assets::logging;
use member_assets::migrator::{DriveSource, MigrationSummary, Migrator};
use member_assets::settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    let _guard = logging::init(settings.log_file.as_deref())?;

    let source = DriveSource::new(settings.drive_config()).context("Failed to build HTTP client")?;
    let migrator = Migrator::new(settings.migrator_config(), source);

    let summary = migrator
        .migrate(&settings.members_file)
        .await
        .with_context(|| format!("Migration of {} failed", settings.members_file.display()))?;

    report(&summary, &settings);
    Ok(())
}

fn report(summary: &MigrationSummary, settings: &Settings) {
    if settings.dry_run {
        info!("Dry run complete, nothing was downloaded or written");
        info!(" - Would download: {}", summary.planned);
    } else {
        info!("Migration complete");
        info!(" - Downloaded: {}", summary.succeeded);
        info!(" - Failed: {}", summary.failed);
        info!(" - Updated JSON records: {}", summary.updated);
    }
    info!(
        " - Skipped: {} (not a drive link: {}, no file id: {})",
        summary.skipped(),
        summary.not_remote,
        summary.unextractable
    );
    if summary.updated > 0 {
        info!(" - File saved: {}", settings.members_file.display());
    }
}
