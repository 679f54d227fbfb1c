//! Logo asset pipeline.
//!
//! The paginated renderer embeds the company logo on every page header.
//! The image is fetched once per process, downsampled to bounded pixel
//! dimensions, re-encoded as JPEG (directly embeddable as a PDF DCTDecode
//! XObject), and memoized. A broken or unreachable logo degrades to
//! no-logo output; it never fails an export.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum logo width in pixels after downsampling.
pub const MAX_LOGO_WIDTH: u32 = 240;
/// Maximum logo height in pixels after downsampling.
pub const MAX_LOGO_HEIGHT: u32 = 96;

const JPEG_QUALITY: u8 = 85;

/// Where the logo comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogoSource {
    /// HTTP(S) URL resolved with the injected client.
    Url(String),
    /// Already-embedded `data:image/...;base64,` URI.
    DataUri(String),
}

/// Decoded, downsampled logo ready for embedding.
#[derive(Debug, Clone)]
pub struct Logo {
    /// JPEG-encoded pixel data.
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One-fetch-per-process logo cache.
///
/// Constructed once at application start with an injected HTTP client and
/// shared by reference with the export service. The memo slot is written
/// on first use and read-only afterwards, so concurrent exports can share
/// the cache without locking.
pub struct LogoCache {
    client: reqwest::blocking::Client,
    source: Option<LogoSource>,
    slot: OnceCell<Option<Logo>>,
}

impl LogoCache {
    pub fn new(client: reqwest::blocking::Client, source: LogoSource) -> Self {
        Self {
            client,
            source: Some(source),
            slot: OnceCell::new(),
        }
    }

    /// A cache that always yields no logo. Exports render without one.
    pub fn disabled() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            source: None,
            slot: OnceCell::new(),
        }
    }

    /// Fetch lazily on first use; later calls return the memoized result.
    pub fn get(&self) -> Option<&Logo> {
        self.slot
            .get_or_init(|| {
                let source = self.source.as_ref()?;
                match self.load(source) {
                    Ok(logo) => {
                        debug!(width = logo.width, height = logo.height, "logo cached");
                        Some(logo)
                    }
                    Err(err) => {
                        warn!(error = %err, "logo unavailable, exporting without it");
                        None
                    }
                }
            })
            .as_ref()
    }

    fn load(&self, source: &LogoSource) -> anyhow::Result<Logo> {
        let bytes = match source {
            LogoSource::Url(url) => self
                .client
                .get(url)
                .send()?
                .error_for_status()?
                .bytes()?
                .to_vec(),
            LogoSource::DataUri(uri) => decode_data_uri(uri)?,
        };
        downsample(&bytes)
    }
}

fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let payload = uri
        .split_once(',')
        .map(|(_, data)| data)
        .ok_or_else(|| anyhow::anyhow!("malformed data URI"))?;
    Ok(BASE64.decode(payload.trim())?)
}

/// Decode, bound to `MAX_LOGO_WIDTH` x `MAX_LOGO_HEIGHT` preserving aspect
/// ratio, and re-encode as JPEG. Images already within bounds keep their
/// dimensions; this never upscales.
fn downsample(bytes: &[u8]) -> anyhow::Result<Logo> {
    let decoded = image::load_from_memory(bytes)?;
    let bounded = if decoded.width() > MAX_LOGO_WIDTH || decoded.height() > MAX_LOGO_HEIGHT {
        decoded.thumbnail(MAX_LOGO_WIDTH, MAX_LOGO_HEIGHT)
    } else {
        decoded
    };
    let rgb = bounded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode(&rgb, width, height, image::ColorType::Rgb8)?;

    Ok(Logo {
        jpeg,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 red pixel PNG.
    const PIXEL_PNG_BASE64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

    fn pixel_data_uri() -> String {
        format!("data:image/png;base64,{}", PIXEL_PNG_BASE64)
    }

    #[test]
    fn test_data_uri_logo_is_decoded_and_memoized() {
        let cache = LogoCache::new(
            reqwest::blocking::Client::new(),
            LogoSource::DataUri(pixel_data_uri()),
        );
        let logo = cache.get().expect("logo should decode");
        assert_eq!(logo.width, 1);
        assert_eq!(logo.height, 1);
        assert!(!logo.jpeg.is_empty());
        // JPEG SOI marker.
        assert_eq!(&logo.jpeg[..2], &[0xFF, 0xD8]);

        // Second call hits the memo (same allocation).
        let again = cache.get().expect("memoized logo");
        assert!(std::ptr::eq(logo, again));
    }

    #[test]
    fn test_corrupt_logo_degrades_to_none() {
        let cache = LogoCache::new(
            reqwest::blocking::Client::new(),
            LogoSource::DataUri("data:image/png;base64,not-base64!!".to_string()),
        );
        assert!(cache.get().is_none());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_disabled_cache_yields_no_logo() {
        assert!(LogoCache::disabled().get().is_none());
    }

    #[test]
    fn test_malformed_data_uri_rejected() {
        assert!(decode_data_uri("no-comma-here").is_err());
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageOutputFormat::Png,
            )
            .unwrap();
        bytes
    }

    #[test]
    fn test_wide_logo_is_bounded() {
        let logo = downsample(&png_bytes(600, 50)).unwrap();
        assert_eq!((logo.width, logo.height), (240, 20));
    }

    #[test]
    fn test_small_logo_keeps_its_dimensions() {
        let logo = downsample(&png_bytes(30, 20)).unwrap();
        assert_eq!((logo.width, logo.height), (30, 20));
    }
}
