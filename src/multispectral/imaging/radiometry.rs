//! First-order radiometric conversion from frame metadata.
//!
//! `L = a1 / gain * (p - black) / 2^bits / exposure`, without the vignette
//! and row-gradient terms of the full sensor model.

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::metadata::{Metadata, tags};
use crate::multispectral::raster::{FloatImage, RawFrame};

/// Band name the camera reports for its thermal imager.
pub const THERMAL_BAND: &str = "LWIR";

/// ISO value corresponding to unit gain.
const UNIT_GAIN_ISO: f64 = 100.0;

const KELVIN_OFFSET: f64 = 273.15;

pub fn is_thermal_band(band_name: &str) -> bool {
    band_name.eq_ignore_ascii_case(THERMAL_BAND)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiometricParams {
    pub black_level: f64,
    pub bits_per_sample: u32,
    /// Seconds
    pub exposure_time: f64,
    pub gain: f64,
    /// First radiometric calibration coefficient (a1)
    pub sensitivity: f64,
}

impl RadiometricParams {
    pub fn from_metadata(meta: &Metadata, raw: &RawFrame) -> Result<Self> {
        let black_levels = meta.require_f64_list(tags::BLACK_LEVEL)?;
        if black_levels.is_empty() {
            return Err(PreprocessError::MetadataError(format!(
                "empty {} in {}",
                tags::BLACK_LEVEL,
                meta.source().display()
            )));
        }
        let black_level = black_levels.iter().sum::<f64>() / black_levels.len() as f64;

        let bits_per_sample = meta
            .get_f64(tags::BITS_PER_SAMPLE)
            .map(|bits| bits as u32)
            .unwrap_or(raw.bits_per_sample);

        let exposure_time = meta.require_f64(tags::EXPOSURE_TIME)?;
        if exposure_time <= 0.0 {
            return Err(PreprocessError::MetadataError(format!(
                "non-positive exposure time {} in {}",
                exposure_time,
                meta.source().display()
            )));
        }

        let gain = meta
            .get_f64(tags::ISO_SPEED)
            .map(|iso| iso / UNIT_GAIN_ISO)
            .filter(|gain| *gain > 0.0)
            .unwrap_or(1.0);

        let sensitivity = meta.require_f64(tags::RADIOMETRIC_CALIBRATION)?;

        Ok(Self {
            black_level,
            bits_per_sample,
            exposure_time,
            gain,
            sensitivity,
        })
    }

    pub fn radiance(&self, raw: u16) -> f32 {
        let full_scale = 2f64.powi(self.bits_per_sample as i32);
        let normalized = (raw as f64 - self.black_level) / full_scale;
        (self.sensitivity / self.gain * normalized / self.exposure_time) as f32
    }

    pub fn convert(&self, raw: &RawFrame) -> FloatImage {
        let data = raw.data.iter().map(|&p| self.radiance(p)).collect();
        FloatImage::new(raw.width, raw.height, data)
    }
}

/// Thermal frames store centikelvin; converts them to degrees Celsius.
pub fn centikelvin_to_celsius(raw: &RawFrame) -> FloatImage {
    let data = raw
        .data
        .iter()
        .map(|&p| (p as f64 * 0.01 - KELVIN_OFFSET) as f32)
        .collect();
    FloatImage::new(raw.width, raw.height, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn metadata(pairs: &[(&str, serde_json::Value)]) -> Metadata {
        let values: BTreeMap<String, serde_json::Value> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        Metadata::new("IMG_0001_1.tif", values)
    }

    fn raw(values: Vec<u16>) -> RawFrame {
        RawFrame {
            width: values.len(),
            height: 1,
            data: values,
            bits_per_sample: 16,
        }
    }

    #[test]
    fn test_params_from_metadata() {
        let meta = metadata(&[
            (tags::BLACK_LEVEL, json!("4800 4800 4800 4801")),
            (tags::EXPOSURE_TIME, json!(0.002)),
            (tags::ISO_SPEED, json!(200)),
            (tags::RADIOMETRIC_CALIBRATION, json!([0.0005, 7e-5, 2e-6])),
        ]);
        let params = RadiometricParams::from_metadata(&meta, &raw(vec![0])).unwrap();

        assert_relative_eq!(params.black_level, 4800.25);
        assert_eq!(params.bits_per_sample, 16);
        assert_relative_eq!(params.gain, 2.0);
        assert_relative_eq!(params.sensitivity, 0.0005);
    }

    #[test]
    fn test_radiance_is_linear_above_black_level() {
        let params = RadiometricParams {
            black_level: 1000.0,
            bits_per_sample: 16,
            exposure_time: 0.001,
            gain: 1.0,
            sensitivity: 0.5,
        };
        let image = params.convert(&raw(vec![1000, 1000 + 32768]));

        assert_relative_eq!(image.data[0], 0.0);
        assert_relative_eq!(image.data[1], 250.0, max_relative = 1e-6);
    }

    #[test]
    fn test_missing_exposure_is_reported() {
        let meta = metadata(&[
            (tags::BLACK_LEVEL, json!(4800)),
            (tags::RADIOMETRIC_CALIBRATION, json!([0.0005])),
        ]);
        let err = RadiometricParams::from_metadata(&meta, &raw(vec![0])).unwrap_err();
        assert!(matches!(err, PreprocessError::MissingTag { ref tag, .. } if tag == tags::EXPOSURE_TIME));
    }

    #[test]
    fn test_thermal_conversion() {
        let image = centikelvin_to_celsius(&raw(vec![29315, 30315]));
        assert_relative_eq!(image.data[0], 20.0, epsilon = 1e-3);
        assert_relative_eq!(image.data[1], 30.0, epsilon = 1e-3);
        assert!(is_thermal_band("LWIR"));
        assert!(!is_thermal_band("NIR"));
    }
}
