use crate::error::FetchError;
use crate::ProgressRateLimiter;
use bytes::{Bytes, BytesMut};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use reqwest::Client;
use std::io::Cursor;
use std::path::Path;
use tar::Archive;

/// Thin wrapper over a `reqwest::Client` for GitHub release assets.
///
/// Downloads are streamed chunk-by-chunk rather than buffered whole by
/// `reqwest::Response::bytes()`, so that a progress callback can observe
/// intermediate byte counts instead of only a single jump at completion.
pub struct Downloader {
    client: Client,
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("lemon-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Fetch the latest release tag for `repo` (`"owner/name"`).
    pub async fn latest_version(&self, repo: &str) -> Result<String, FetchError> {
        let url = format!("https://api.github.com/repos/{repo}/releases/latest");
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await?
            .error_for_status()?;

        let json: serde_json::Value = resp.json().await?;
        json["tag_name"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| FetchError::InvalidResponse {
                message: "tag_name not found in GitHub API response".into(),
            })
    }

    /// Build the download URL for a release asset.
    pub fn asset_url(&self, repo: &str, asset_name: &str, version: &str) -> String {
        format!("https://github.com/{repo}/releases/download/{version}/{asset_name}")
    }

    /// Download `asset_name` from `version` of `repo`, reporting progress via
    /// `progress_cb(bytes_received, total_bytes)`. `total_bytes` is 0 when the
    /// server withholds `Content-Length`. The callback is rate-limited to at
    /// most once every 33 ms, with a guaranteed final call at EOF.
    pub async fn download(
        &self,
        repo: &str,
        asset_name: &str,
        version: &str,
        mut progress_cb: impl FnMut(u64, u64) + Send,
    ) -> Result<Bytes, FetchError> {
        let url = self.asset_url(repo, asset_name, version);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let total = resp.content_length().unwrap_or(0);

        let mut buf = BytesMut::new();
        let mut received: u64 = 0;
        let mut limiter = ProgressRateLimiter::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            buf.extend_from_slice(&chunk);
            if limiter.ready() {
                progress_cb(received, total);
            }
        }
        progress_cb(received, total);

        if total != 0 && received != total {
            return Err(FetchError::IncompleteDownload {
                asset: asset_name.to_string(),
                received,
                expected: total,
            });
        }

        Ok(buf.freeze())
    }
}

/// Extract an archive (`.zip` or `.tar.gz`/`.tgz`) into `dest`, stripping the
/// top-level directory component every release tarball wraps its contents in.
pub fn extract(asset_name: &str, bytes: &Bytes, dest: &Path) -> Result<(), FetchError> {
    std::fs::create_dir_all(dest)?;
    if asset_name.ends_with(".zip") {
        extract_zip(bytes, dest)
    } else if asset_name.ends_with(".tar.gz") || asset_name.ends_with(".tgz") {
        extract_tar_gz_strip_top(bytes, dest)
    } else {
        Err(FetchError::UnsupportedFormat(asset_name.to_string()))
    }
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<(), FetchError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let file_path = match file.enclosed_name() {
            Some(p) => p,
            None => continue,
        };

        let components: Vec<_> = file_path.components().collect();
        if components.len() <= 1 {
            continue;
        }
        let rel_path: std::path::PathBuf = components.iter().skip(1).collect();
        let dest_path = dest.join(rel_path);

        if file.is_dir() {
            std::fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = std::fs::File::create(&dest_path)?;
            std::io::copy(&mut file, &mut out)?;
        }
    }

    Ok(())
}

fn extract_tar_gz_strip_top(bytes: &[u8], dest: &Path) -> Result<(), FetchError> {
    let tar_gz = GzDecoder::new(Cursor::new(bytes));
    let mut archive = Archive::new(tar_gz);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let full_path = entry.path()?.to_path_buf();
        let components: Vec<_> = full_path.components().collect();
        if components.len() <= 1 {
            continue;
        }
        let rel_path: std::path::PathBuf = components.iter().skip(1).collect();
        let dest_path = dest.join(rel_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(dest_path)?;
    }

    Ok(())
}
