//! Calibration panel settings and region statistics.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::raster::RawFrame;

/// Panel location as fractions of the frame width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for PanelRegion {
    fn default() -> Self {
        // centred square covering the middle fifth of the frame
        Self {
            x: 0.4,
            y: 0.4,
            width: 0.2,
            height: 0.2,
        }
    }
}

impl PanelRegion {
    /// Pixel bounds `(x0, y0, x1, y1)`, exclusive end, clipped to the frame.
    pub fn to_pixels(&self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let clip = |fraction: f64, size: usize| ((fraction.clamp(0.0, 1.0) * size as f64).round() as usize).min(size);
        let x0 = clip(self.x, width);
        let y0 = clip(self.y, height);
        let x1 = clip(self.x + self.width, width);
        let y1 = clip(self.y + self.height, height);
        (x0, y0, x1.max(x0), y1.max(y0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    pub region: PanelRegion,
    /// Minimum region mean as a fraction of the sensor's full scale
    pub min_mean_fraction: f64,
    /// Maximum standard deviation relative to the mean; the panel is uniform
    pub max_relative_std: f64,
    pub max_saturated_fraction: f64,
    /// Known panel reflectance per band name
    pub reflectance_by_band: BTreeMap<String, f64>,
    /// Reflectance used for bands missing from `reflectance_by_band`
    pub default_reflectance: Option<f64>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            region: PanelRegion::default(),
            min_mean_fraction: 0.1,
            max_relative_std: 0.05,
            max_saturated_fraction: 0.01,
            reflectance_by_band: BTreeMap::new(),
            default_reflectance: Some(0.49),
        }
    }
}

impl PanelSettings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PreprocessError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn reflectance_for(&self, band_name: &str) -> Option<f64> {
        self.reflectance_by_band
            .get(band_name)
            .copied()
            .or(self.default_reflectance)
    }
}

/// Raw-count statistics of the panel region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
    pub saturated_count: usize,
}

impl PanelStats {
    pub fn of_region(raw: &RawFrame, region: &PanelRegion) -> Option<Self> {
        let (x0, y0, x1, y1) = region.to_pixels(raw.width, raw.height);
        let count = (x1 - x0) * (y1 - y0);
        if count == 0 {
            return None;
        }

        let saturation = full_scale(raw.bits_per_sample);
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut saturated_count = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let value = raw.get(x, y);
                if value as u32 >= saturation {
                    saturated_count += 1;
                }
                let value = value as f64;
                sum += value;
                sum_sq += value * value;
            }
        }

        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Some(Self {
            mean,
            std: variance.sqrt(),
            count,
            saturated_count,
        })
    }

    pub fn saturated_fraction(&self) -> f64 {
        self.saturated_count as f64 / self.count as f64
    }
}

/// Largest value representable with `bits` bits, capped to 16 bits.
pub fn full_scale(bits: u32) -> u32 {
    (1u32 << bits.clamp(1, 16)) - 1
}

/// A detected panel: its raw statistics and known reflectance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelReading {
    pub stats: PanelStats,
    pub reflectance: f64,
}
