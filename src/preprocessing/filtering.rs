//! # Image Filtering Module
//!
//! Contrast scaling and neighbourhood noise reduction applied ahead of
//! binarization by the preprocessing strategies.

use tracing;

use super::buffer::PixelBuffer;
use super::types::PreprocessingError;

/// Applies `v' = factor * (v - 128) + 128` to every colour channel, clamped
/// to `[0, 255]`. Alpha is untouched. Mutates the consumed buffer in place.
///
/// # Examples
///
/// ```
/// use medication_label_ocr::preprocessing::{scale_contrast, PixelBuffer};
///
/// let buffer = PixelBuffer::from_gray_fn(1, 1, |_, _| 100).unwrap();
/// let scaled = scale_contrast(buffer, 2.0);
/// assert_eq!(scaled.pixel(0, 0), [72, 72, 72, 255]);
/// ```
pub fn scale_contrast(mut buffer: PixelBuffer, factor: f32) -> PixelBuffer {
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        *out = (factor * (v as f32 - 128.0) + 128.0).round().clamp(0.0, 255.0) as u8;
    }

    for px in buffer.as_raw_mut().chunks_exact_mut(4) {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    }
    buffer
}

/// Replaces each pixel with the mean of itself and its 4-neighbours.
///
/// Border pixels average over the neighbours that exist. Produces a new buffer
/// since every output pixel reads unmodified input.
pub fn neighbor_average(buffer: &PixelBuffer) -> Result<PixelBuffer, PreprocessingError> {
    let start_time = std::time::Instant::now();
    let (width, height) = buffer.dimensions();
    let mut output = PixelBuffer::allocate(width, height)?;

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0u32; 3];
            let mut count = 0u32;
            let mut add = |px: [u8; 4]| {
                sums[0] += px[0] as u32;
                sums[1] += px[1] as u32;
                sums[2] += px[2] as u32;
                count += 1;
            };

            add(buffer.pixel(x, y));
            if x > 0 {
                add(buffer.pixel(x - 1, y));
            }
            if x + 1 < width {
                add(buffer.pixel(x + 1, y));
            }
            if y > 0 {
                add(buffer.pixel(x, y - 1));
            }
            if y + 1 < height {
                add(buffer.pixel(x, y + 1));
            }

            let alpha = buffer.pixel(x, y)[3];
            output.set_pixel(
                x,
                y,
                [
                    ((sums[0] + count / 2) / count) as u8,
                    ((sums[1] + count / 2) / count) as u8,
                    ((sums[2] + count / 2) / count) as u8,
                    alpha,
                ],
            );
        }
    }

    tracing::trace!(
        target: "ocr_preprocessing",
        "Neighbour averaging completed in {}ms for {}x{}",
        start_time.elapsed().as_millis(),
        width,
        height
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_contrast_is_identity_at_one() {
        let buffer = PixelBuffer::from_gray_fn(4, 4, |x, y| (x * 40 + y * 10) as u8).unwrap();
        let scaled = scale_contrast(buffer.clone(), 1.0);
        assert_eq!(scaled, buffer);
    }

    #[test]
    fn test_scale_contrast_clamps() {
        let buffer = PixelBuffer::from_gray_fn(2, 1, |x, _| if x == 0 { 10 } else { 250 }).unwrap();
        let scaled = scale_contrast(buffer, 2.5);
        assert_eq!(scaled.pixel(0, 0)[0], 0);
        assert_eq!(scaled.pixel(1, 0)[0], 255);
        assert_eq!(scaled.pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_scale_contrast_keeps_midpoint() {
        let buffer = PixelBuffer::from_gray_fn(1, 1, |_, _| 128).unwrap();
        assert_eq!(scale_contrast(buffer, 2.0).pixel(0, 0)[0], 128);
    }

    #[test]
    fn test_neighbor_average_removes_isolated_speck() {
        let buffer =
            PixelBuffer::from_gray_fn(5, 5, |x, y| if x == 2 && y == 2 { 255 } else { 0 }).unwrap();
        let averaged = neighbor_average(&buffer).unwrap();

        assert_eq!(averaged.pixel(2, 2)[0], 51);
        assert_eq!(averaged.pixel(2, 1)[0], 51);
        assert_eq!(averaged.pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_neighbor_average_uniform_is_unchanged() {
        let buffer = PixelBuffer::from_gray_fn(6, 3, |_, _| 77).unwrap();
        assert_eq!(neighbor_average(&buffer).unwrap(), buffer);
    }
}
