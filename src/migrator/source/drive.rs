use super::AssetSource;
use crate::migrator::{MigrateError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Drive download endpoint settings
#[derive(Debug, Clone)]
pub struct DriveSourceConfig {
    /// Download endpoint, the file id is appended as a query parameter
    pub download_url: String,
    /// Name prefix of the cookie carrying the confirmation token
    pub cookie_prefix: String,
    /// Connect timeout and the longest allowed gap between received bytes
    pub timeout: Duration,
    /// Write size used while streaming the body to disk
    pub chunk_size: usize,
}

impl Default for DriveSourceConfig {
    fn default() -> Self {
        Self {
            download_url: "https://docs.google.com/uc?export=download".to_string(),
            cookie_prefix: "download_warning".to_string(),
            timeout: Duration::from_secs(15),
            chunk_size: 32 * 1024,
        }
    }
}

/// Fetches files from a drive-style host.
///
/// Large files are answered with a virus-scan warning page plus a
/// `download_warning*` cookie; the cookie value has to be sent back as
/// `confirm` to get the actual bytes.
#[derive(Clone)]
pub struct DriveSource {
    client: Client,
    config: DriveSourceConfig,
}

impl DriveSource {
    pub fn new(config: DriveSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("member-assets/", env!("CARGO_PKG_VERSION")))
            // Idle limits only; a slow body may take longer than this overall
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &DriveSourceConfig {
        &self.config
    }

    async fn request(&self, params: &[(&str, &str)]) -> Result<Response> {
        let response = self
            .client
            .get(&self.config.download_url)
            .query(params)
            .send()
            .await?;

        Ok(response)
    }

    /// Confirmation token from a `download_warning*` cookie, if the host set one
    fn confirm_token(&self, response: &Response) -> Option<String> {
        response
            .cookies()
            .find(|cookie| cookie.name().starts_with(&self.config.cookie_prefix))
            .map(|cookie| cookie.value().to_string())
    }

    /// Stream the body into `dest`.
    ///
    /// Bytes land in `<dest>.part` first and are renamed into place once the
    /// body is complete; a broken stream removes the partial file.
    async fn save_response(&self, mut response: Response, dest: &Path) -> Result<u64> {
        let part = partial_path(dest);

        let streamed = async {
            let file = tokio::fs::File::create(&part).await?;
            let mut writer = BufWriter::with_capacity(self.config.chunk_size, file);
            let mut written = 0u64;

            while let Some(chunk) = response.chunk().await? {
                // keep-alive
                if chunk.is_empty() {
                    continue;
                }
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            writer.flush().await?;
            Ok::<u64, MigrateError>(written)
        }
        .await;

        match streamed {
            Ok(written) => {
                tokio::fs::rename(&part, dest).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    debug!("Could not remove {}: {}", part.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AssetSource for DriveSource {
    fn id(&self) -> &'static str {
        "drive"
    }

    async fn fetch(&self, file_id: &str, dest: &Path) -> Result<u64> {
        debug!("Requesting file id {}", file_id);
        let response = self.request(&[("id", file_id)]).await?;

        let response = match self.confirm_token(&response) {
            Some(token) => {
                debug!("Download warning for {}, confirming", file_id);
                drop(response);
                self.request(&[("id", file_id), ("confirm", token.as_str())]).await?
            }
            None => response,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(MigrateError::Retrieval {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        self.save_response(response, dest).await
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
