//! Band warping with precomputed homographies.

use std::path::Path;

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::raster::FloatImage;

/// 3x3 projective transform mapping target pixels to source pixels.
pub type Homography = [[f64; 3]; 3];

pub const IDENTITY: Homography = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Loads one warp matrix per band from a JSON array of 3x3 arrays.
pub fn load_warp_matrices(path: &Path) -> Result<Vec<Homography>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        PreprocessError::InputReadError(format!("{}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn bilinear(band: &FloatImage, x: f64, y: f64) -> f32 {
    let max_x = (band.width - 1) as f64;
    let max_y = (band.height - 1) as f64;
    // within half a pixel of the border samples the edge pixel
    if !(-0.5..=max_x + 0.5).contains(&x) || !(-0.5..=max_y + 0.5).contains(&y) {
        return 0.0;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(band.width - 1);
    let y1 = (y0 + 1).min(band.height - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let top = band.get(x0, y0) * (1.0 - fx) + band.get(x1, y0) * fx;
    let bottom = band.get(x0, y1) * (1.0 - fx) + band.get(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Resamples `band` onto a `width` x `height` grid.
///
/// Each target pixel is mapped through `warp` into reference coordinates and
/// then scaled into the band's own resolution, so low-resolution bands are
/// upsampled onto the reference grid. Pixels falling outside the band are 0.
pub fn warp_band(band: &FloatImage, warp: &Homography, width: usize, height: usize) -> FloatImage {
    let mut out = FloatImage::zeros(width, height);
    if band.width == 0 || band.height == 0 {
        return out;
    }
    let scale_x = band.width as f64 / width as f64;
    let scale_y = band.height as f64 / height as f64;

    for y in 0..height {
        for x in 0..width {
            let (xf, yf) = (x as f64, y as f64);
            let w = warp[2][0] * xf + warp[2][1] * yf + warp[2][2];
            if w.abs() < f64::EPSILON {
                continue;
            }
            let u = (warp[0][0] * xf + warp[0][1] * yf + warp[0][2]) / w;
            let v = (warp[1][0] * xf + warp[1][1] * yf + warp[1][2]) / w;
            let sx = (u + 0.5) * scale_x - 0.5;
            let sy = (v + 0.5) * scale_y - 0.5;
            out.data[y * width + x] = bilinear(band, sx, sy);
        }
    }
    out
}

/// Aligns all bands onto the first band's grid.
pub fn align_to_reference(bands: Vec<FloatImage>, warps: Option<&[Homography]>) -> Result<Vec<FloatImage>> {
    let Some(reference) = bands.first() else {
        return Ok(bands);
    };
    let (width, height) = reference.dimensions();

    if let Some(warps) = warps {
        if warps.len() != bands.len() {
            return Err(PreprocessError::CaptureError(format!(
                "{} warp matrices provided for {} bands",
                warps.len(),
                bands.len()
            )));
        }
    }

    Ok(bands
        .into_iter()
        .enumerate()
        .map(|(i, band)| {
            let warp = warps.map(|w| w[i]).unwrap_or(IDENTITY);
            if warp == IDENTITY && band.dimensions() == (width, height) {
                band
            } else {
                warp_band(&band, &warp, width, height)
            }
        })
        .collect())
}
