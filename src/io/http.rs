//! HTTP Range request source for remote ZIP archives.
//!
//! This module implements random-access reading from HTTP servers using the
//! Range request header (RFC 7233). Selective extraction of several entries
//! becomes a single multi-range request answered with a
//! `multipart/byteranges` response.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use super::{ByteRange, RangeSource, multipart};
use crate::error::{Error, Result};

/// HTTP Range source for remote ZIP archives.
///
/// ## Requirements
///
/// The remote server must:
/// - Support HTTP Range requests (indicated by `Accept-Ranges: bytes`)
/// - Provide a `Content-Length` header in HEAD responses
/// - Answer multi-range requests with a `multipart/byteranges` body whose
///   parts are in request order (the server must not coalesce or reorder
///   ranges)
///
/// ## Features
///
/// - Automatic retry with backoff for transient network errors
/// - Transfer statistics tracking for monitoring bandwidth usage
/// - Connection pooling via reqwest
///
/// ## Example
///
/// ```no_run
/// use remotezip::HttpSource;
///
/// # async fn example() -> remotezip::Result<()> {
/// let source = HttpSource::new("https://example.com/large.zip".to_string()).await?;
/// println!("File size: {} bytes", source.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpSource {
    /// HTTP client with connection pooling.
    client: Client,
    /// The URL of the remote archive.
    url: String,
    /// Total size of the remote resource in bytes.
    len: u64,
    /// Cumulative bytes transferred from the network.
    transferred_bytes: AtomicU64,
    /// Maximum number of attempts for transiently failing requests.
    max_retry: u32,
}

impl HttpSource {
    /// Create a new HTTP Range source for the given URL.
    ///
    /// Performs a HEAD request to verify the server responds, check for
    /// Range support via `Accept-Ranges`, and obtain the resource size from
    /// `Content-Length`.
    ///
    /// # Errors
    ///
    /// Fails with an I/O error if the request fails, the server doesn't
    /// support Range requests, or no `Content-Length` is provided.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(request_error)?;

        let resp = client.head(&url).send().await.map_err(request_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !accept_ranges.contains("bytes") {
            return Err(Error::Io(io::Error::other(
                "remote server does not support Range requests",
            )));
        }

        let len = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                Error::Io(io::Error::other(
                    "remote server did not return Content-Length",
                ))
            })?;

        Ok(HttpSource {
            client,
            url,
            len,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Total size of the remote resource in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True for a zero-length resource.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cumulative bytes received from the server across all reads.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Send `GET` with `Range: bytes=<spec>`, retrying transient failures.
    ///
    /// Timeouts and connection errors are retried with linear backoff
    /// (500 ms × attempt) up to `max_retry` attempts. Any non-2xx status
    /// fails with the server's message.
    async fn get_range(&self, spec: &str) -> Result<reqwest::Response> {
        debug!("GET {} Range: bytes={spec}", self.url);

        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .get(&self.url)
                .header("Range", format!("bytes={spec}"))
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => return Err(status_error(resp).await),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.max_retry {
                        return Err(request_error(e));
                    }
                    warn!("connection error, retry {attempt}/{}: {e}", self.max_retry);
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => return Err(request_error(e)),
            }
        }
    }

    /// Fetch the response body and account it in the transfer statistics.
    async fn body(&self, resp: reqwest::Response) -> Result<Vec<u8>> {
        let bytes = resp.bytes().await.map_err(request_error)?;
        self.transferred_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RangeSource for HttpSource {
    async fn read(&self, range: ByteRange) -> Result<Vec<u8>> {
        let resp = self.get_range(&range.to_string()).await?;
        let body = self.body(resp).await?;
        if body.len() as u64 == range.length {
            return Ok(body);
        }
        // A server answering 200 with the whole resource still satisfies a
        // single-range request; slice the requested window out of it.
        if body.len() as u64 >= range.end() {
            return Ok(body[range.start as usize..range.end() as usize].to_vec());
        }
        Err(Error::Io(io::Error::other(format!(
            "requested {} bytes for range {range}, server returned {}",
            range.length,
            body.len()
        ))))
    }

    /// Read several ranges with a single request.
    ///
    /// Two or more ranges are sent as one comma-joined Range header; the
    /// response body must then be `multipart/byteranges` and its parts are
    /// assumed to arrive in request order.
    async fn read_many(&self, ranges: &[ByteRange]) -> Result<Vec<Vec<u8>>> {
        match ranges {
            [] => Ok(Vec::new()),
            [range] => Ok(vec![self.read(*range).await?]),
            _ => {
                let spec = ranges
                    .iter()
                    .map(ByteRange::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                let resp = self.get_range(&spec).await?;

                let boundary = resp
                    .headers()
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .and_then(multipart::boundary_from_content_type)
                    .ok_or_else(|| {
                        Error::Io(io::Error::other(
                            "multi-range response is not multipart/byteranges",
                        ))
                    })?;

                let body = self.body(resp).await?;
                Ok(multipart::split_parts(&body, &boundary)?)
            }
        }
    }

    async fn read_tail(&self, n: u64) -> Result<Vec<u8>> {
        if n > self.len {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "tail of {n} bytes requested from a {}-byte resource",
                    self.len
                ),
            )));
        }
        let resp = self.get_range(&format!("-{n}")).await?;
        let mut body = self.body(resp).await?;
        // A server answering 200 with the whole resource still satisfies a
        // suffix request; only the final n bytes are kept.
        if body.len() as u64 > n {
            body.drain(..body.len() - n as usize);
        }
        if (body.len() as u64) < n {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("requested the final {n} bytes, server returned {}", body.len()),
            )));
        }
        Ok(body)
    }

    async fn close(&self) -> Result<()> {
        // The connection pool is released when the source is dropped.
        Ok(())
    }
}

fn request_error(e: reqwest::Error) -> Error {
    Error::Io(io::Error::other(e))
}

/// Turn a non-2xx response into an I/O error carrying the server message.
async fn status_error(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let message = resp.text().await.unwrap_or_default();
    let message = message.trim();
    if message.is_empty() {
        Error::Io(io::Error::other(format!(
            "HTTP request failed with status: {status}"
        )))
    } else {
        Error::Io(io::Error::other(format!(
            "HTTP request failed with status {status}: {message}"
        )))
    }
}
