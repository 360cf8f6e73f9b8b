//! Downloads images and inlines them as PNG data URIs.
//!
//! Cards are delivered as a single HTML fragment to a chat client that does
//! not fetch remote images, so every picture on a card is embedded.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use reqwest::Client;
use tracing::debug;

use crate::error::{CardError, Result};

/// Default bound for thumbnails, in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Bound used when the link itself points at an image.
pub const DIRECT_IMAGE_SIZE: u32 = 300;

/// Supersampling factor for the circular mask edge.
const MASK_SUPERSAMPLE: u32 = 3;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Fetches remote images and converts them to data URIs.
#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
}

impl ImageFetcher {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Downloads `url` and returns it as a resized PNG data URI.
    ///
    /// A missing or empty URL yields `Ok(None)`. Every call re-fetches.
    ///
    /// # Errors
    /// [`CardError::Fetch`] on network failure or a non-success status,
    /// [`CardError::Decode`] when the payload is not a supported image.
    pub async fn fetch_as_data_uri(
        &self,
        url: Option<&str>,
        max_dimension: u32,
        circular_crop: bool,
    ) -> Result<Option<String>> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };

        debug!("Fetching image {} (max {}px)", url, max_dimension);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CardError::from_reqwest(url, &e))?;

        if !response.status().is_success() {
            return Err(CardError::fetch(
                url,
                format!("unexpected status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CardError::from_reqwest(url, &e))?;

        // Decoding and resampling are CPU bound; keep them off the async workers
        tokio::task::spawn_blocking(move || encode_data_uri(&bytes, max_dimension, circular_crop))
            .await
            .map_err(|e| CardError::decode("image", format!("encode task failed: {e}")))?
            .map(Some)
    }
}

/// Decodes `bytes`, optionally crops to a circle, fits the result within
/// `max_dimension` and re-encodes it as a base64 PNG data URI.
///
/// # Errors
/// Returns [`CardError::Decode`] for unsupported or corrupt image data.
pub fn encode_data_uri(bytes: &[u8], max_dimension: u32, circular_crop: bool) -> Result<String> {
    let mut img =
        image::load_from_memory(bytes).map_err(|e| CardError::decode("image", e.to_string()))?;

    if circular_crop {
        img = crop_to_circle(&img);
    }

    let max_dimension = max_dimension.max(1);
    if img.width() > max_dimension || img.height() > max_dimension {
        img = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CardError::decode("image", e.to_string()))?;

    Ok(format!("{DATA_URI_PREFIX}{}", STANDARD.encode(&png)))
}

/// Masks everything outside the inscribed ellipse, keeping existing alpha.
fn crop_to_circle(img: &DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    let mask = circle_mask(width, height);

    let mut rgba = img.to_rgba8();
    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let coverage = mask.get_pixel(x, y).0[0];
        pixel.0[3] = pixel.0[3].min(coverage);
    }

    DynamicImage::ImageRgba8(rgba)
}

/// Draws a full-alpha ellipse at 3x scale and downsamples it, which
/// anti-aliases the edge.
fn circle_mask(width: u32, height: u32) -> GrayImage {
    let big_w = width * MASK_SUPERSAMPLE;
    let big_h = height * MASK_SUPERSAMPLE;
    let (rx, ry) = (f64::from(big_w) / 2.0, f64::from(big_h) / 2.0);

    let big = GrayImage::from_fn(big_w, big_h, |x, y| {
        let dx = (f64::from(x) + 0.5 - rx) / rx;
        let dy = (f64::from(y) + 0.5 - ry) / ry;
        if dx * dx + dy * dy <= 1.0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    image::imageops::resize(&big, width, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn decode(uri: &str) -> DynamicImage {
        let payload = uri.strip_prefix(DATA_URI_PREFIX).unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_resizes_preserving_aspect_ratio() {
        let uri = encode_data_uri(&png_bytes(400, 200), 128, false).unwrap();
        let img = decode(&uri);
        assert_eq!((img.width(), img.height()), (128, 64));
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let uri = encode_data_uri(&png_bytes(32, 16), 128, false).unwrap();
        let img = decode(&uri);
        assert_eq!((img.width(), img.height()), (32, 16));
    }

    #[test]
    fn test_circular_crop_clears_corners() {
        let uri = encode_data_uri(&png_bytes(64, 64), 64, true).unwrap();
        let img = decode(&uri).to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        assert_eq!(img.get_pixel(32, 32).0[3], 255);
    }

    #[test]
    fn test_deterministic_output() {
        let bytes = png_bytes(90, 50);
        let a = encode_data_uri(&bytes, 64, true).unwrap();
        let b = encode_data_uri(&bytes, 64, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = encode_data_uri(b"definitely not an image", 128, false).unwrap_err();
        assert!(matches!(err, CardError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_missing_url_is_none() {
        let fetcher = ImageFetcher::new(Client::new());
        assert_eq!(fetcher.fetch_as_data_uri(None, 128, false).await.unwrap(), None);
        assert_eq!(
            fetcher.fetch_as_data_uri(Some(""), 128, false).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_fetch_encodes_downloaded_image() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(png_bytes(1024, 512), "image/png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/junk.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"junk".to_vec(), "image/png"))
            .mount(&server)
            .await;

        let fetcher = ImageFetcher::new(Client::new());
        let uri = fetcher
            .fetch_as_data_uri(Some(&format!("{}/big.png", server.uri())), 256, false)
            .await
            .unwrap()
            .unwrap();
        let img = decode(&uri);
        assert_eq!((img.width(), img.height()), (256, 128));

        let err = fetcher
            .fetch_as_data_uri(Some(&format!("{}/junk.png", server.uri())), 256, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CardError::Decode { .. }));
    }
}
