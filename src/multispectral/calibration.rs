//! Panel calibration: scanning a dataset for calibration panel frames.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::imaging::ImagingBackend;
use crate::multispectral::metadata::MetadataReader;
use crate::multispectral::raster::RasterIo;
use crate::multispectral::scan;

/// Panel reflectance per band and the raw panel mean of the last detected frame.
///
/// Only constructed once every expected band has a reflectance.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelCalibration {
    reflectance: BTreeMap<String, f64>,
    mean_radiance: f64,
    source_frame: PathBuf,
}

impl PanelCalibration {
    pub fn new(reflectance: BTreeMap<String, f64>, mean_radiance: f64, source_frame: PathBuf) -> Result<Self> {
        if !(mean_radiance.is_finite() && mean_radiance > 0.0) {
            return Err(PreprocessError::InvalidCalibration(format!(
                "panel mean {} from {} must be positive",
                mean_radiance,
                source_frame.display()
            )));
        }
        Ok(Self {
            reflectance,
            mean_radiance,
            source_frame,
        })
    }

    pub fn reflectance(&self) -> &BTreeMap<String, f64> {
        &self.reflectance
    }

    pub fn band_count(&self) -> usize {
        self.reflectance.len()
    }

    pub fn mean_radiance(&self) -> f64 {
        self.mean_radiance
    }

    pub fn source_frame(&self) -> &Path {
        &self.source_frame
    }

    pub fn panel_reflectance(&self, band_name: &str) -> Result<f64> {
        self.reflectance
            .get(band_name)
            .copied()
            .ok_or_else(|| PreprocessError::MissingBandCalibration(band_name.to_string()))
    }

    /// Scale factor turning a band's radiance into reflectance.
    pub fn radiance_to_reflectance(&self, band_name: &str) -> Result<f64> {
        Ok(self.panel_reflectance(band_name)? / self.mean_radiance)
    }
}

/// Options controlling the panel scan.
#[derive(Debug, Clone)]
pub struct PanelScan<'a> {
    /// Bands a complete calibration must cover
    pub expected_bands: usize,
    /// Directory name visited first
    pub calibration_dir: Option<&'a str>,
}

/// Scans capture directories until panels for all expected bands are found.
#[instrument(skip(backend, metadata, raster))]
pub fn panel_detection<B, M, R>(
    root: &Path,
    scan_options: &PanelScan<'_>,
    backend: &B,
    metadata: &M,
    raster: &R,
) -> Result<PanelCalibration>
where
    B: ImagingBackend + ?Sized,
    M: MetadataReader + ?Sized,
    R: RasterIo + ?Sized,
{
    let dirs = scan::calibration_order(scan::capture_dirs(root)?, scan_options.calibration_dir);
    let mut reflectance = BTreeMap::new();

    for dir in &dirs {
        debug!(dir = %dir.display(), "Scanning for calibration panels");
        for frame in scan::frames_in_dir(dir)? {
            let meta = metadata.read_metadata(&frame)?;
            let raw = raster.read_frame(&frame)?;

            let Some(reading) = backend.detect_panel(&meta, &raw)? else {
                continue;
            };
            let band_name = meta.band_name()?;
            info!(
                frame = %frame.display(),
                band = %band_name,
                reflectance = reading.reflectance,
                mean = reading.stats.mean,
                "Panel detected"
            );
            reflectance.insert(band_name, reading.reflectance);

            if reflectance.len() == scan_options.expected_bands {
                return PanelCalibration::new(reflectance, reading.stats.mean, frame);
            }
        }
    }

    Err(PreprocessError::IncompletePanelCalibration {
        found: reflectance.len(),
        expected: scan_options.expected_bands,
        bands: reflectance.into_keys().collect(),
    })
}
