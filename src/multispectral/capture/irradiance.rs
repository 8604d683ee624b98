use crate::multispectral::capture::types::LoadedBand;
use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::config::IrradianceMode;
use crate::multispectral::imaging::is_thermal_band;
use crate::multispectral::metadata::{Metadata, tags};

/// Downwelling irradiance recorded by the light sensor for this frame's band.
pub fn dls_irradiance(meta: &Metadata) -> Result<f64> {
    let irradiance = meta
        .get_f64(tags::SPECTRAL_IRRADIANCE)
        .or_else(|| meta.get_f64(tags::IRRADIANCE))
        .ok_or_else(|| PreprocessError::MissingTag {
            tag: tags::SPECTRAL_IRRADIANCE.to_string(),
            file: meta.source().to_path_buf(),
        })?;
    if !(irradiance.is_finite() && irradiance > 0.0) {
        return Err(PreprocessError::MetadataError(format!(
            "irradiance {} in {} must be positive",
            irradiance,
            meta.source().display()
        )));
    }
    Ok(irradiance)
}

/// Per-band irradiance in band order; `None` for thermal bands.
pub fn capture_irradiance(bands: &[LoadedBand], mode: &IrradianceMode) -> Result<Vec<Option<f64>>> {
    if let IrradianceMode::Scaled(coefficients) = mode {
        if coefficients.len() < bands.len() {
            return Err(PreprocessError::CaptureError(format!(
                "{} irradiance coefficients for {} bands",
                coefficients.len(),
                bands.len()
            )));
        }
    }

    bands
        .iter()
        .enumerate()
        .map(|(i, band)| -> Result<Option<f64>> {
            if is_thermal_band(&band.meta.band_name()?) {
                return Ok(None);
            }
            let reading = dls_irradiance(&band.meta)?;
            Ok(Some(match mode {
                IrradianceMode::Direct => reading,
                IrradianceMode::Scaled(coefficients) => reading * coefficients[i],
            }))
        })
        .collect()
}
