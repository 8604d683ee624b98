use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::multispectral::{
    calibration::{PanelCalibration, PanelScan, panel_detection},
    common::error::{PreprocessError, Result},
    config::ReflectanceConfig,
    conversions::timing::PipelineTimings,
    imaging::{BasicImaging, ImagingBackend},
    metadata::{Exiftool, MetadataReader, TagCopier, copy_exif_data},
    raster::{RasterIo, TiffRasterIo},
    scan,
};

const OUTPUT_DIR_NAME: &str = "_radiance_to_reflectance";

/// Outcome of a reflectance batch
#[derive(Debug)]
pub struct ReflectanceReport {
    pub calibration: PanelCalibration,
    pub outputs: Vec<PathBuf>,
    pub timings: PipelineTimings,
}

/// Panel-calibrated conversion of every frame in a dataset to reflectance.
pub struct ReflectancePipeline<B: ImagingBackend, M: MetadataReader, R: RasterIo, T: TagCopier> {
    backend: B,
    metadata: M,
    raster: R,
    tags: T,
    config: ReflectanceConfig,
}

impl ReflectancePipeline<BasicImaging, Exiftool, TiffRasterIo, Exiftool> {
    pub fn new(config: ReflectanceConfig, backend: BasicImaging, exiftool: Exiftool) -> Self {
        Self {
            backend,
            metadata: exiftool.clone(),
            raster: TiffRasterIo,
            tags: exiftool,
            config,
        }
    }
}

impl<B: ImagingBackend, M: MetadataReader, R: RasterIo, T: TagCopier> ReflectancePipeline<B, M, R, T> {
    pub fn with_custom(backend: B, metadata: M, raster: R, tags: T, config: ReflectanceConfig) -> Self {
        Self {
            backend,
            metadata,
            raster,
            tags,
            config,
        }
    }

    /// `<output_dir>` if configured, else `_radiance_to_reflectance` next to the dataset.
    pub fn output_dir(&self, dataset: &Path) -> Result<PathBuf> {
        match &self.config.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => scan::sibling_dir(dataset, OUTPUT_DIR_NAME),
        }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidDimensions(width, height));
        }

        Ok(())
    }

    /// Derives the panel calibration from the dataset's own frames.
    pub fn calibrate(&self, dataset: &Path) -> Result<PanelCalibration> {
        let options = PanelScan {
            expected_bands: self.config.camera.expected_panel_bands(),
            calibration_dir: self.config.calibration_dir.as_deref(),
        };
        panel_detection(dataset, &options, &self.backend, &self.metadata, &self.raster)
    }

    pub fn convert_frame(&self, frame: &Path, calibration: &PanelCalibration, output_root: &Path) -> Result<PathBuf> {
        self.convert_frame_with_timings(frame, calibration, output_root, &mut PipelineTimings::new())
    }

    /// Writes `<output_root>/<capture-dir>/<frame name>` and copies the frame's tags onto it.
    #[instrument(skip(self, frame, calibration, output_root, timings), fields(frame = %frame.display()))]
    pub fn convert_frame_with_timings(
        &self,
        frame: &Path,
        calibration: &PanelCalibration,
        output_root: &Path,
        timings: &mut PipelineTimings,
    ) -> Result<PathBuf> {
        let raw = timings.time("decode_frame", || self.raster.read_frame(frame))?;
        self.validate_dimensions(raw.width, raw.height)?;
        let meta = timings.time("read_metadata", || self.metadata.read_metadata(frame))?;

        let reflectance = timings.time("radiance_to_reflectance", || -> Result<_> {
            let mut radiance = self.backend.raw_to_radiance(&meta, &raw)?;
            let band_name = meta.band_name()?;
            radiance.scale(calibration.radiance_to_reflectance(&band_name)?);
            self.backend.correct_lens_distortion(&meta, radiance)
        })?;
        drop(raw);

        let (Some(sub_folder), Some(file_name)) = (
            frame.parent().and_then(Path::file_name),
            frame.file_name(),
        ) else {
            return Err(PreprocessError::InputReadError(format!(
                "{}: frame must live in a capture directory",
                frame.display()
            )));
        };
        let out_dir = output_root.join(sub_folder);
        fs::create_dir_all(&out_dir).map_err(|e| {
            PreprocessError::OutputWriteError(format!("{}: {}", out_dir.display(), e))
        })?;
        let out_path = out_dir.join(file_name);

        timings.time("write_band", || {
            self.raster.write_band(&out_path, &reflectance, self.config.compression)
        })?;
        timings.time("copy_metadata", || copy_exif_data(&self.tags, frame, &out_path))?;

        info!(output = %out_path.display(), "Reflectance written");
        Ok(out_path)
    }

    /// Calibrates on the dataset, then converts every non-excluded frame.
    #[instrument(skip(self, dataset), fields(dataset = %dataset.display()))]
    pub fn run(&self, dataset: &Path) -> Result<ReflectanceReport> {
        let mut timings = PipelineTimings::new();

        let calibration = timings.time("panel_detection", || self.calibrate(dataset))?;
        info!(
            bands = calibration.band_count(),
            mean_radiance = calibration.mean_radiance(),
            panel = %calibration.source_frame().display(),
            "Panel calibration complete"
        );

        let frames = scan::dataset_frames(dataset, &self.config.excluded_bands)?;
        let output_root = self.output_dir(dataset)?;
        info!(frames = frames.len(), output = %output_root.display(), "Converting frames");

        let mut outputs = Vec::with_capacity(frames.len());
        for frame in &frames {
            outputs.push(self.convert_frame_with_timings(frame, &calibration, &output_root, &mut timings)?);
        }

        Ok(ReflectanceReport {
            calibration,
            outputs,
            timings,
        })
    }

    pub fn config(&self) -> &ReflectanceConfig {
        &self.config
    }
}
