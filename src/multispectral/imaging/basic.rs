use tracing::debug;

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::imaging::align::{Homography, align_to_reference};
use crate::multispectral::imaging::backend::ImagingBackend;
use crate::multispectral::imaging::panel::{PanelReading, PanelSettings, PanelStats, full_scale};
use crate::multispectral::imaging::radiometry::{RadiometricParams, centikelvin_to_celsius, is_thermal_band};
use crate::multispectral::metadata::Metadata;
use crate::multispectral::raster::{FloatImage, RawFrame};

/// Metadata-driven imaging backend.
///
/// Radiance follows [`RadiometricParams`], lens correction is a pass-through,
/// panels are found by testing a fixed region for a bright uniform patch, and
/// alignment applies caller-provided warps.
#[derive(Debug, Clone, Default)]
pub struct BasicImaging {
    panel: PanelSettings,
}

impl BasicImaging {
    pub fn new(panel: PanelSettings) -> Self {
        Self { panel }
    }

    pub fn panel_settings(&self) -> &PanelSettings {
        &self.panel
    }
}

impl ImagingBackend for BasicImaging {
    fn raw_to_radiance(&self, meta: &Metadata, raw: &RawFrame) -> Result<FloatImage> {
        if meta.band_name().is_ok_and(|band| is_thermal_band(&band)) {
            return Ok(centikelvin_to_celsius(raw));
        }
        let params = RadiometricParams::from_metadata(meta, raw)?;
        debug!(?params, "Converting raw counts to radiance");
        Ok(params.convert(raw))
    }

    fn correct_lens_distortion(&self, _meta: &Metadata, image: FloatImage) -> Result<FloatImage> {
        Ok(image)
    }

    fn detect_panel(&self, meta: &Metadata, raw: &RawFrame) -> Result<Option<PanelReading>> {
        let band_name = meta.band_name()?;
        if is_thermal_band(&band_name) {
            return Ok(None);
        }
        let Some(stats) = PanelStats::of_region(raw, &self.panel.region) else {
            return Ok(None);
        };

        let min_mean = self.panel.min_mean_fraction * full_scale(raw.bits_per_sample) as f64;
        let uniform = stats.mean > 0.0 && stats.std / stats.mean <= self.panel.max_relative_std;
        let detected = stats.mean >= min_mean
            && uniform
            && stats.saturated_fraction() <= self.panel.max_saturated_fraction;
        debug!(band = %band_name, ?stats, detected, "Panel region checked");
        if !detected {
            return Ok(None);
        }

        let reflectance = self
            .panel
            .reflectance_for(&band_name)
            .ok_or(PreprocessError::MissingBandCalibration(band_name))?;
        Ok(Some(PanelReading { stats, reflectance }))
    }

    fn align_bands(&self, bands: Vec<FloatImage>, warps: Option<&[Homography]>) -> Result<Vec<FloatImage>> {
        align_to_reference(bands, warps)
    }
}
