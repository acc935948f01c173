//! Image decoding boundary
//!
//! [`ImageDecoder`] turns an image URL into pixels at an exact target size.
//! [`HttpImageDecoder`] downloads with `reqwest` and resamples with the
//! `image` crate on the blocking pool.

use async_trait::async_trait;
use image::imageops::FilterType;
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors decoding a single image
#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    /// Image could not be downloaded
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    /// Bytes are not a supported image
    #[error("Unsupported or corrupt image at {url}: {reason}")]
    Format { url: String, reason: String },

    /// Decoding task panicked or was cancelled
    #[error("Decode task failed: {0}")]
    Task(String),
}

/// Decoded RGBA8 pixels
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, 4 bytes per pixel
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Decodes remote images to exact target dimensions
#[async_trait]
pub trait ImageDecoder: Send + Sync {
    async fn decode(&self, url: &str, width: u32, height: u32) -> Result<DecodedImage, DecodeError>;
}

/// Downloads over HTTP and resizes to the requested size
#[derive(Debug, Clone)]
pub struct HttpImageDecoder {
    client: Client,
}

impl HttpImageDecoder {
    /// Create a decoder with a per-download timeout
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }
}

/// Decode `bytes` and resample to exactly `width` x `height`
pub fn resize_bytes(
    url: &str,
    bytes: &[u8],
    width: u32,
    height: u32,
) -> Result<DecodedImage, DecodeError> {
    let image = image::load_from_memory(bytes).map_err(|e| DecodeError::Format {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let resized = image.resize_exact(width, height, FilterType::Triangle).to_rgba8();
    Ok(DecodedImage::new(width, height, resized.into_raw()))
}

#[async_trait]
impl ImageDecoder for HttpImageDecoder {
    async fn decode(&self, url: &str, width: u32, height: u32) -> Result<DecodedImage, DecodeError> {
        let download_error = |reason: String| DecodeError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let url = url.to_string();
        tokio::task::spawn_blocking(move || resize_bytes(&url, &bytes, width, height))
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
    }
}
