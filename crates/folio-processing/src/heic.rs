//! HEIC/HEIF detection and conversion to JPEG.
//!
//! Browsers cannot render HEIC, so photos coming straight off a phone are
//! re-encoded as JPEG before validation. Only the primary image is kept; the
//! other frames of a burst or sequence are dropped.

use anyhow::{bail, Context};
use folio_core::{MediaError, MediaFile, MediaResult};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::sync::Arc;

pub const HEIC_EXTENSIONS: &[&str] = &["heic", "heif", "hif"];

pub const HEIC_CONTENT_TYPES: &[&str] = &[
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Whether a file name / declared MIME type pair denotes HEIC/HEIF.
pub fn is_heic(name: &str, content_type: &str) -> bool {
    let name = name.to_lowercase();
    let by_extension = HEIC_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext)));
    let content_type = content_type.trim().to_lowercase();
    by_extension || HEIC_CONTENT_TYPES.contains(&content_type.as_str())
}

/// [`is_heic`] for an optional file; no file is never HEIC.
pub fn is_heic_file(file: Option<&MediaFile>) -> bool {
    file.is_some_and(|f| is_heic(&f.name, &f.content_type))
}

/// `photo.HEIC` -> `photo.jpg`. Names without a usable stem become `image.jpg`.
pub fn jpeg_file_name(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    if stem.trim().is_empty() {
        "image.jpg".to_string()
    } else {
        format!("{}.jpg", stem)
    }
}

/// Decodes the first (primary) image of a HEIC/HEIF container.
pub trait HeicDecoder: Send + Sync {
    fn decode_first_frame(&self, data: &[u8]) -> anyhow::Result<DynamicImage>;
}

/// libheif-backed decoder.
#[cfg(feature = "heif")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibheifDecoder;

#[cfg(feature = "heif")]
impl HeicDecoder for LibheifDecoder {
    fn decode_first_frame(&self, data: &[u8]) -> anyhow::Result<DynamicImage> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(data).context("Failed to read HEIF container")?;
        let handle = ctx
            .primary_image_handle()
            .context("HEIF container has no primary image")?;
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .context("Failed to decode HEIF image")?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| anyhow::anyhow!("Decoded HEIF image has no interleaved RGB plane"))?;

        let (width, height, stride) = (plane.width, plane.height, plane.stride);
        let row_len = width as usize * 3;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&plane.data[start..start + row_len]);
        }

        let rgb = image::RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow::anyhow!("Decoded HEIF plane does not match its dimensions"))?;
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

/// Stand-in used when the crate is built without the `heif` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDecoder;

impl HeicDecoder for UnavailableDecoder {
    fn decode_first_frame(&self, _data: &[u8]) -> anyhow::Result<DynamicImage> {
        bail!("HEIC decoding is not available on this server")
    }
}

/// The decoder compiled into this build.
#[cfg(feature = "heif")]
pub fn default_decoder() -> Arc<dyn HeicDecoder> {
    Arc::new(LibheifDecoder)
}

/// The decoder compiled into this build.
#[cfg(not(feature = "heif"))]
pub fn default_decoder() -> Arc<dyn HeicDecoder> {
    Arc::new(UnavailableDecoder)
}

/// Re-encodes HEIC/HEIF files as JPEG.
#[derive(Clone)]
pub struct HeicConverter {
    decoder: Arc<dyn HeicDecoder>,
    quality: u8,
}

impl HeicConverter {
    pub fn new(decoder: Arc<dyn HeicDecoder>, quality: u8) -> Self {
        Self {
            decoder,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Convert `file` to JPEG. The input is left untouched.
    ///
    /// `progress` receives 10 when decoding starts and 100 once the JPEG is
    /// ready; nothing in between.
    pub async fn convert(
        &self,
        file: &MediaFile,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> MediaResult<MediaFile> {
        progress(10);
        let start = std::time::Instant::now();

        let decoder = Arc::clone(&self.decoder);
        let data = file.data.clone();
        let quality = self.quality;

        // Decode and encode are CPU-bound; keep them off the async workers.
        let jpeg = tokio::task::spawn_blocking(move || {
            transcode_to_jpeg(decoder.as_ref(), &data, quality)
        })
        .await
        .map_err(|e| MediaError::conversion(format!("conversion task failed: {}", e)))?
        .map_err(|e| {
            tracing::warn!(
                error = %format!("{:#}", e),
                file = %file.name,
                size_bytes = file.size(),
                "HEIC conversion failed"
            );
            MediaError::conversion(format!("{:#}", e))
        })?;

        let converted = MediaFile::new(jpeg_file_name(&file.name), JPEG_CONTENT_TYPE, jpeg);

        tracing::info!(
            from = %file.name,
            to = %converted.name,
            original_bytes = file.size(),
            converted_bytes = converted.size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "HEIC converted to JPEG"
        );

        progress(100);
        Ok(converted)
    }
}

fn transcode_to_jpeg(
    decoder: &dyn HeicDecoder,
    data: &[u8],
    quality: u8,
) -> anyhow::Result<Vec<u8>> {
    let image = decoder.decode_first_frame(data)?;
    if image.width() == 0 || image.height() == 0 {
        bail!("decoder returned no image data");
    }

    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .context("Failed to encode JPEG")?;
    Ok(out)
}
