//! Runtime settings: defaults, then `migrate.toml`, then `MIGRATE_*` variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::migrator::{DriveSourceConfig, MigrateError, MigratorConfig, Result};

/// Environment variable naming an alternative settings file
pub const CONFIG_PATH_VAR: &str = "MIGRATE_CONFIG";

const ENV_PREFIX: &str = "MIGRATE";
const DEFAULT_CONFIG_NAME: &str = "migrate";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON file holding the member records
    pub members_file: PathBuf,
    /// Directory downloaded images are written to
    pub output_dir: PathBuf,
    /// Web path prefix written into migrated records
    pub url_prefix: String,
    /// Substring identifying drive share links
    pub host_marker: String,
    /// Download endpoint of the drive host
    pub download_url: String,
    /// Cookie name prefix carrying the confirmation token
    pub cookie_prefix: String,
    /// Extension of downloaded images
    pub extension: String,
    pub timeout_secs: u64,
    pub dry_run: bool,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let migrator = MigratorConfig::default();
        let drive = DriveSourceConfig::default();

        Self {
            members_file: PathBuf::from("server/data/members.json"),
            output_dir: migrator.output_dir,
            url_prefix: migrator.url_prefix,
            host_marker: migrator.host_marker,
            download_url: drive.download_url,
            cookie_prefix: drive.cookie_prefix,
            extension: migrator.extension,
            timeout_secs: drive.timeout.as_secs(),
            dry_run: migrator.dry_run,
            log_file: None,
        }
    }
}

impl Settings {
    /// Load from the working directory and the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::from_sources(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Layer an optional settings file and an environment source over the
    /// defaults. Without an explicit file, `migrate.{toml,json,...}` is
    /// picked up if present.
    pub fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings: Self = Config::builder()
            .add_source(file_source)
            .add_source(env.try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| MigrateError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(MigrateError::Config("extension must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(MigrateError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.host_marker.is_empty() {
            return Err(MigrateError::Config("host_marker must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn migrator_config(&self) -> MigratorConfig {
        MigratorConfig {
            output_dir: self.output_dir.clone(),
            url_prefix: self.url_prefix.clone(),
            host_marker: self.host_marker.clone(),
            extension: self.extension.clone(),
            dry_run: self.dry_run,
        }
    }

    pub fn drive_config(&self) -> DriveSourceConfig {
        DriveSourceConfig {
            download_url: self.download_url.clone(),
            cookie_prefix: self.cookie_prefix.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..DriveSourceConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let settings = Settings::from_sources(Some(&path), env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.members_file, PathBuf::from("server/data/members.json"));
        assert_eq!(settings.output_dir, PathBuf::from("client/public/members"));
        assert_eq!(settings.url_prefix, "/members");
        assert_eq!(settings.extension, "jpg");
        assert_eq!(settings.timeout_secs, 15);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.toml");
        std::fs::write(
            &path,
            r#"
members_file = "data/members.json"
url_prefix = "/images/members"
extension = "png"
timeout_secs = 30
"#,
        )
        .unwrap();

        let settings = Settings::from_sources(
            Some(&path),
            env(&[("MIGRATE_TIMEOUT_SECS", "5"), ("MIGRATE_DRY_RUN", "true")]),
        )
        .unwrap();

        assert_eq!(settings.members_file, PathBuf::from("data/members.json"));
        assert_eq!(settings.url_prefix, "/images/members");
        assert_eq!(settings.extension, "png");
        assert_eq!(settings.timeout_secs, 5);
        assert!(settings.dry_run);

        let migrator = settings.migrator_config();
        assert_eq!(migrator.extension, "png");
        assert!(migrator.dry_run);
        assert_eq!(settings.drive_config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::from_sources(Some(&dir.path().join("nope.toml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.toml");

        std::fs::write(&path, "extension = \"\"\n").unwrap();
        assert!(Settings::from_sources(Some(&path), env(&[])).is_err());

        std::fs::write(&path, "timeout_secs = 0\n").unwrap();
        assert!(Settings::from_sources(Some(&path), env(&[])).is_err());
    }
}
