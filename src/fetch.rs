use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use reqwest::Client;
use tracing::debug;

use crate::error::LoadError;

/// Resolves a URL to "loaded" or a [`LoadError`]; no payload is kept.
pub trait ImageFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<(), LoadError>> + Send;
}

/// Fetches `http(s)://` URLs over the network and `file://` URLs or plain paths from disk,
/// then checks that the bytes decode as an image.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    http: Client,
}

impl UrlFetcher {
    pub fn new() -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self { http })
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let request_failed = |source: reqwest::Error| LoadError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.http.get(url).send().await.map_err(request_failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_failed)?;
        Ok(bytes.to_vec())
    }
}

impl ImageFetcher for UrlFetcher {
    async fn fetch(&self, url: &str) -> Result<(), LoadError> {
        let bytes = match local_path(url) {
            Some(path) => {
                let owned = url.to_string();
                blocking(url, move || {
                    std::fs::read(&path).map_err(|source| LoadError::Io { url: owned, source })
                })
                .await?
            }
            None => self.fetch_http(url).await?,
        };

        let owned = url.to_string();
        let (width, height) = blocking(url, move || decode_dimensions(&owned, &bytes)).await?;
        debug!(url, width, height, "image decoded");
        Ok(())
    }
}

/// Maps `file://` URLs and scheme-less strings to a filesystem path.
fn local_path(url: &str) -> Option<PathBuf> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    let raw = url.strip_prefix("file://").unwrap_or(url);
    Some(Path::new(raw).to_path_buf())
}

fn decode_dimensions(url: &str, bytes: &[u8]) -> Result<(u32, u32), LoadError> {
    let img = image::load_from_memory(bytes).map_err(|source| LoadError::Decode {
        url: url.to_string(),
        source,
    })?;
    Ok((img.width(), img.height()))
}

async fn blocking<T, F>(url: &str, f: F) -> Result<T, LoadError>
where
    F: FnOnce() -> Result<T, LoadError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| LoadError::Io {
            url: url.to_string(),
            source: io::Error::other(err),
        })?
}
