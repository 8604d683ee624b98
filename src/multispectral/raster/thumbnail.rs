//! RGB preview rendering for stacks.

use image::RgbImage;

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::raster::types::FloatImage;

/// Fraction of pixels clipped at each end of the contrast stretch.
const CLIP_FRACTION: f64 = 0.005;

fn percentile(sorted: &[f32], fraction: f64) -> f32 {
    let index = ((sorted.len() - 1) as f64 * fraction).round() as usize;
    sorted[index]
}

/// Renders three reflectance bands as an 8-bit RGB image.
///
/// All three channels share one linear stretch between the 0.5th and 99.5th
/// percentile so relative band brightness is preserved.
pub fn render_rgb_preview(rgb: [&FloatImage; 3]) -> Result<RgbImage> {
    let (width, height) = rgb[0].dimensions();
    if rgb.iter().any(|band| band.dimensions() != (width, height)) || width == 0 || height == 0 {
        return Err(PreprocessError::InvalidDimensions(width, height));
    }

    let mut finite: Vec<f32> = rgb
        .iter()
        .flat_map(|band| band.data.iter().copied())
        .filter(|v| v.is_finite())
        .collect();
    let (low, high) = if finite.is_empty() {
        (0.0, 1.0)
    } else {
        finite.sort_unstable_by(|a, b| a.total_cmp(b));
        (percentile(&finite, CLIP_FRACTION), percentile(&finite, 1.0 - CLIP_FRACTION))
    };
    let range = (high - low).max(f32::EPSILON);

    let mut pixels = Vec::with_capacity(width * height * 3);
    for i in 0..width * height {
        for band in rgb {
            let value = band.data[i];
            let scaled = if value.is_finite() {
                ((value - low) / range * 255.0).clamp(0.0, 255.0)
            } else {
                0.0
            };
            pixels.push(scaled.round() as u8);
        }
    }

    RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or(PreprocessError::InvalidDimensions(width, height))
}
