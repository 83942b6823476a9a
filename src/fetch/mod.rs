//! Upstream retrieval: HTTP(S) URLs through an [`HttpClient`], anything else
//! from the local filesystem.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use bytes::Bytes;
use tracing::debug;

use crate::error::FetchError;

/// Maximum accepted upstream payload (50 MB)
pub const MAX_PAYLOAD_SIZE: usize = 50 * 1024 * 1024;

/// GETs `url` and returns the body, failing on non-2xx status.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FetchError> {
    fetch_bytes_limited(client, url, MAX_PAYLOAD_SIZE).await
}

/// Like [`fetch_bytes`], rejecting bodies larger than `max` bytes.
///
/// An advertised `Content-Length` over the limit fails before the body is read.
pub async fn fetch_bytes_limited<C: HttpClient>(
    client: &C,
    url: &str,
    max: usize,
) -> Result<Bytes, FetchError> {
    let parsed = url.parse::<reqwest::Url>().map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    if let Some(len) = resp.content_length() {
        let size = usize::try_from(len).unwrap_or(usize::MAX);
        if size > max {
            return Err(FetchError::TooLarge { size, max });
        }
    }

    // Chunked responses carry no length up front
    let bytes = resp.bytes().await?;
    if bytes.len() > max {
        return Err(FetchError::TooLarge {
            size: bytes.len(),
            max,
        });
    }

    Ok(bytes)
}

/// True when `source` is an absolute `http` or `https` URL.
fn is_http_url(source: &str) -> bool {
    reqwest::Url::parse(source)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Loads feed data from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client, source), fields(source = %source))]
pub async fn fetch_source<C: HttpClient>(client: &C, source: &str) -> Result<Bytes, FetchError> {
    let bytes = if is_http_url(source) {
        fetch_bytes(client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .map(Bytes::from)
            .map_err(|e| FetchError::Io {
                path: source.to_string(),
                source: e,
            })?
    };
    debug!(bytes = bytes.len(), "Source fetched");
    Ok(bytes)
}
