use std::time::Duration;

use thiserror::Error;

/// An image URL failed to fetch or decode.
///
/// Always recovered locally: the slot still counts as loaded so the show never stalls.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request could not be sent or the body could not be read.
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The bytes arrived but are not a decodable image.
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    /// Local file access failed.
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// The fetch did not settle within the configured timeout.
    #[error("{url} did not load within {}", humantime::format_duration(*.after))]
    TimedOut { url: String, after: Duration },
}
