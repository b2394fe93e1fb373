//! # Image Thresholding Module
//!
//! Fixed-threshold binarization used by every preprocessing strategy.

use super::buffer::PixelBuffer;

/// Maps each colour channel to 255 when `value > threshold`, else 0.
/// Alpha is untouched. Mutates the consumed buffer in place.
///
/// # Examples
///
/// ```
/// use medication_label_ocr::preprocessing::{binarize, PixelBuffer};
///
/// let buffer = PixelBuffer::from_gray_fn(2, 1, |x, _| if x == 0 { 128 } else { 129 }).unwrap();
/// let binary = binarize(buffer, 128);
/// assert_eq!(binary.pixel(0, 0)[0], 0);
/// assert_eq!(binary.pixel(1, 0)[0], 255);
/// ```
pub fn binarize(mut buffer: PixelBuffer, threshold: u8) -> PixelBuffer {
    for px in buffer.as_raw_mut().chunks_exact_mut(4) {
        for channel in px.iter_mut().take(3) {
            *channel = if *channel > threshold { 255 } else { 0 };
        }
    }
    buffer
}

/// Returns true when every colour channel of every pixel is 0 or 255.
pub fn is_binary(buffer: &PixelBuffer) -> bool {
    buffer
        .as_raw()
        .chunks_exact(4)
        .all(|px| px[..3].iter().all(|&c| c == 0 || c == 255))
}
