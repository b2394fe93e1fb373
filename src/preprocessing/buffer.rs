//! # Pixel Buffer Module
//!
//! Owned RGBA pixel storage and the whole-buffer transforms every strategy
//! builds on: grayscale conversion, rotation and OCR-oriented upscaling.
//! Grayscale buffers keep the RGBA layout with equal colour channels.

use std::io::Cursor;

use image::{DynamicImage, RgbaImage};
use tracing;

use super::types::PreprocessingError;

/// Default long-edge target for upscaling small captures.
pub const DEFAULT_TARGET_LONG_EDGE: u32 = 2000;

/// Default upper bound on the upscale factor.
pub const DEFAULT_MAX_UPSCALE: f32 = 2.0;

const CHANNELS: usize = 4;

/// Owned RGBA pixel buffer.
///
/// A buffer is never shared between strategy trials: each trial receives its
/// own copy through [`PixelBuffer::try_clone`].
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Byte length of an RGBA buffer, or `None` on overflow.
fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
}

/// Allocates a zeroed RGBA buffer, reporting allocation failure instead of aborting.
fn alloc_rgba(width: u32, height: u32) -> Result<Vec<u8>, PreprocessingError> {
    let len = rgba_len(width, height)
        .ok_or(PreprocessingError::BufferAllocation { width, height })?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| PreprocessingError::BufferAllocation { width, height })?;
    data.resize(len, 0);
    Ok(data)
}

/// Computes the upscale factor for an image: the long edge is brought towards
/// `target_long_edge`, never shrinking and never exceeding `max_scale`.
pub fn upscale_factor(width: u32, height: u32, target_long_edge: u32, max_scale: f32) -> f32 {
    let long_edge = width.max(height);
    if long_edge == 0 {
        return 1.0;
    }
    let wanted = target_long_edge as f32 / long_edge as f32;
    wanted.min(max_scale).max(1.0)
}

impl PixelBuffer {
    /// Wraps existing RGBA data, validating its length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PreprocessingError> {
        if rgba_len(width, height) != Some(data.len()) {
            return Err(PreprocessingError::InvalidDimensions {
                width,
                height,
                data_len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Allocates a transparent black buffer.
    pub fn allocate(width: u32, height: u32) -> Result<Self, PreprocessingError> {
        Ok(Self {
            width,
            height,
            data: alloc_rgba(width, height)?,
        })
    }

    /// Builds an opaque gray buffer from a per-pixel intensity function.
    pub fn from_gray_fn<F>(width: u32, height: u32, f: F) -> Result<Self, PreprocessingError>
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut buffer = Self::allocate(width, height)?;
        for y in 0..height {
            for x in 0..width {
                let v = f(x, y);
                buffer.set_pixel(x, y, [v, v, v, 255]);
            }
        }
        Ok(buffer)
    }

    /// Converts a decoded image into an RGBA buffer.
    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            data: rgba.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// Luma (ITU-R BT.601 weights) of one pixel.
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let [r, g, b, _] = self.pixel(x, y);
        luma_of(r, g, b)
    }

    /// Copies the buffer, reporting allocation failure.
    pub fn try_clone(&self) -> Result<Self, PreprocessingError> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())
            .map_err(|_| PreprocessingError::BufferAllocation {
                width: self.width,
                height: self.height,
            })?;
        data.extend_from_slice(&self.data);
        Ok(Self {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Replaces every pixel's colour channels with its luma. Mutates in place;
    /// dimensions and alpha are unchanged.
    pub fn to_grayscale(mut self) -> Self {
        for px in self.data.chunks_exact_mut(CHANNELS) {
            let l = luma_of(px[0], px[1], px[2]);
            px[0] = l;
            px[1] = l;
            px[2] = l;
        }
        self
    }

    /// Rotates 90° clockwise about the centre, swapping width and height.
    pub fn rotate90(&self) -> Result<Self, PreprocessingError> {
        let (w, h) = (self.width, self.height);
        let mut rotated = Self {
            width: h,
            height: w,
            data: alloc_rgba(h, w)?,
        };
        for y in 0..h {
            for x in 0..w {
                rotated.set_pixel(h - 1 - y, x, self.pixel(x, y));
            }
        }
        Ok(rotated)
    }

    /// Upscales so the long edge approaches `target_long_edge`, capped at
    /// `max_scale`. Never downscales; a factor of 1 returns a plain copy.
    pub fn upscale(
        &self,
        target_long_edge: u32,
        max_scale: f32,
    ) -> Result<Self, PreprocessingError> {
        let factor = upscale_factor(self.width, self.height, target_long_edge, max_scale);
        if factor <= 1.0 {
            return self.try_clone();
        }

        let new_width = ((self.width as f32 * factor).round() as u32).max(self.width);
        let new_height = ((self.height as f32 * factor).round() as u32).max(self.height);
        if rgba_len(new_width, new_height).is_none() {
            return Err(PreprocessingError::BufferAllocation {
                width: new_width,
                height: new_height,
            });
        }

        let source = self.to_rgba_image()?;
        let scaled = image::imageops::resize(
            &source,
            new_width,
            new_height,
            image::imageops::FilterType::CatmullRom,
        );

        tracing::debug!(
            target: "ocr_preprocessing",
            "Upscaled {}x{} -> {}x{} (factor {:.2})",
            self.width,
            self.height,
            new_width,
            new_height,
            factor
        );

        Ok(Self {
            width: new_width,
            height: new_height,
            data: scaled.into_raw(),
        })
    }

    /// Copies the buffer into an `image` crate RGBA image.
    pub fn to_rgba_image(&self) -> Result<RgbaImage, PreprocessingError> {
        RgbaImage::from_raw(self.width, self.height, self.try_clone()?.data).ok_or(
            PreprocessingError::InvalidDimensions {
                width: self.width,
                height: self.height,
                data_len: self.data.len(),
            },
        )
    }

    /// Encodes the buffer as PNG, the format handed to the recognition engine.
    pub fn encode_png(&self) -> Result<Vec<u8>, PreprocessingError> {
        let image = DynamicImage::ImageRgba8(self.to_rgba_image()?);
        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| PreprocessingError::ImageLoad {
                message: format!("PNG encoding failed: {e}"),
            })?;
        Ok(out.into_inner())
    }
}

fn luma_of(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}
