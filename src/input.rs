//! # Image Input Module
//!
//! The boundary adapter between the capture collaborator and the pipeline.
//! Raw bytes, base64 strings or files are validated against format-specific
//! size and memory limits, then decoded into an owned [`PixelBuffer`].
//!
//! ## Supported Image Formats
//!
//! - PNG, JPEG, BMP, TIFF, WebP

use std::path::PathBuf;

use base64::Engine as _;
use tracing::{debug, info};

use crate::errors::{PipelineError, PipelineResult};
use crate::ocr_config::InputLimits;
use crate::preprocessing::PixelBuffer;

/// Where the raw capture comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes (file upload, blob)
    Bytes(Vec<u8>),
    /// Base64-encoded image, optionally a `data:image/...;base64,` URL
    Base64(String),
    /// Path to an image file
    File(PathBuf),
}

impl ImageSource {
    /// Short description for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Bytes(_) => "bytes",
            ImageSource::Base64(_) => "base64",
            ImageSource::File(_) => "file",
        }
    }

    /// Reference stored on parsed records; only file sources have one
    pub fn reference(&self) -> Option<String> {
        match self {
            ImageSource::File(path) => Some(path.display().to_string()),
            _ => None,
        }
    }
}

/// Estimate memory usage for decoding based on encoded size and format
///
/// | Format | Factor |
/// |--------|--------|
/// | PNG    | 3.0x   |
/// | JPEG   | 2.5x   |
/// | BMP    | 1.2x   |
/// | TIFF   | 4.0x   |
/// | other  | 3.0x   |
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::input::estimate_memory_usage;
/// use image::ImageFormat;
///
/// let memory_mb = estimate_memory_usage(1024 * 1024, &ImageFormat::Png);
/// assert_eq!(memory_mb, 3.0);
///
/// let memory_mb = estimate_memory_usage(2 * 1024 * 1024, &ImageFormat::Jpeg);
/// assert_eq!(memory_mb, 5.0);
/// ```
pub fn estimate_memory_usage(file_size: u64, format: &image::ImageFormat) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);

    let memory_factor = match format {
        image::ImageFormat::Png => 3.0,
        image::ImageFormat::Jpeg => 2.5,
        image::ImageFormat::Bmp => 1.2,
        image::ImageFormat::Tiff => 4.0,
        _ => 3.0,
    };

    file_size_mb * memory_factor
}

/// Decodes a base64 payload, accepting an optional data-URL prefix.
pub fn decode_base64_image(encoded: &str) -> PipelineResult<Vec<u8>> {
    let payload = match encoded.find(";base64,") {
        Some(idx) if encoded.trim_start().starts_with("data:") => {
            &encoded[idx + ";base64,".len()..]
        }
        _ => encoded,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| PipelineError::ImageLoad(format!("Invalid base64 image data: {}", e)))
}

/// Reads the raw encoded bytes from any source.
pub fn read_source_bytes(source: ImageSource) -> PipelineResult<Vec<u8>> {
    match source {
        ImageSource::Bytes(bytes) => Ok(bytes),
        ImageSource::Base64(encoded) => decode_base64_image(&encoded),
        ImageSource::File(path) => std::fs::read(&path).map_err(|e| {
            PipelineError::ImageLoad(format!(
                "Cannot read image file {}: {}",
                path.display(),
                e
            ))
        }),
    }
}

/// Validates encoded bytes against the general limit, the detected format's
/// limit and the decode memory estimate. Returns the detected format.
pub fn validate_image_bytes(
    bytes: &[u8],
    limits: &InputLimits,
) -> PipelineResult<image::ImageFormat> {
    let size = bytes.len() as u64;
    if size == 0 {
        return Err(PipelineError::ImageLoad("Image data is empty".to_string()));
    }
    if size > limits.max_file_size {
        return Err(PipelineError::ImageLoad(format!(
            "Image too large: {} bytes (maximum allowed: {} bytes)",
            size, limits.max_file_size
        )));
    }

    let format = image::guess_format(bytes).map_err(|e| {
        PipelineError::ImageLoad(format!("Could not determine image format: {}", e))
    })?;

    let format_limit = match format {
        image::ImageFormat::Png => limits.format_limits.png_max,
        image::ImageFormat::Jpeg => limits.format_limits.jpeg_max,
        image::ImageFormat::Bmp => limits.format_limits.bmp_max,
        image::ImageFormat::Tiff => limits.format_limits.tiff_max,
        image::ImageFormat::WebP => limits.format_limits.webp_max,
        other => {
            return Err(PipelineError::ImageLoad(format!(
                "Unsupported image format: {:?}",
                other
            )))
        }
    };

    if size > format_limit {
        return Err(PipelineError::ImageLoad(format!(
            "Image too large for {:?} format: {} bytes (maximum allowed: {} bytes)",
            format, size, format_limit
        )));
    }

    let estimated_memory_mb = estimate_memory_usage(size, &format);
    debug!("Estimated decode memory for {:?} image: {:.2}MB", format, estimated_memory_mb);
    if estimated_memory_mb > limits.max_memory_mb {
        return Err(PipelineError::ImageLoad(format!(
            "Estimated memory usage too high: {:.2}MB (maximum allowed: {:.2}MB)",
            estimated_memory_mb, limits.max_memory_mb
        )));
    }

    Ok(format)
}

/// Reads, validates and decodes an image into an RGBA pixel buffer.
pub fn load_image(source: ImageSource, limits: &InputLimits) -> PipelineResult<PixelBuffer> {
    let kind = source.kind();
    let bytes = read_source_bytes(source)?;
    let format = validate_image_bytes(&bytes, limits)?;

    let decoded = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        PipelineError::ImageLoad(format!("Failed to decode {:?} image: {}", format, e))
    })?;
    let buffer = PixelBuffer::from_dynamic_image(&decoded);

    info!(
        source = kind,
        format = ?format,
        size_bytes = bytes.len(),
        width = buffer.width(),
        height = buffer.height(),
        "Decoded capture image"
    );

    Ok(buffer)
}
