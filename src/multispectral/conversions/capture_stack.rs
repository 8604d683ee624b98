use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::multispectral::{
    capture::{Capture, capture_irradiance},
    common::error::{PreprocessError, Result},
    config::StackConfig,
    conversions::timing::PipelineTimings,
    imaging::{BasicImaging, ImagingBackend},
    metadata::{Exiftool, MetadataReader, TagCopier, copy_exif_data},
    raster::{FloatImage, RasterIo, TiffRasterIo},
    scan,
};

const STACKS_DIR_NAME: &str = "stacks";
const THUMBNAILS_DIR_NAME: &str = "thumbnails";

/// What happened to one capture
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Written(PathBuf),
    /// The stack exists and overwriting is disabled
    SkippedExisting(PathBuf),
    /// The capture has a different band count than the reference capture
    SkippedIncomplete { found: usize, expected: usize },
}

/// Output directories of a stacking batch
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub stacks_dir: PathBuf,
    pub thumbnail_dir: Option<PathBuf>,
}

/// Outcome of a stacking batch
#[derive(Debug, Default)]
pub struct StackReport {
    pub written: Vec<PathBuf>,
    pub skipped_existing: usize,
    pub skipped_incomplete: usize,
    pub buffers_released: usize,
    pub timings: PipelineTimings,
}

/// Irradiance-normalised, aligned multi-band stacks, one per capture.
pub struct CaptureStackPipeline<B: ImagingBackend, M: MetadataReader, R: RasterIo, T: TagCopier> {
    backend: B,
    metadata: M,
    raster: R,
    tags: T,
    config: StackConfig,
}

impl CaptureStackPipeline<BasicImaging, Exiftool, TiffRasterIo, Exiftool> {
    pub fn new(config: StackConfig, backend: BasicImaging, exiftool: Exiftool) -> Self {
        Self {
            backend,
            metadata: exiftool.clone(),
            raster: TiffRasterIo,
            tags: exiftool,
            config,
        }
    }
}

impl<B: ImagingBackend, M: MetadataReader, R: RasterIo, T: TagCopier> CaptureStackPipeline<B, M, R, T> {
    pub fn with_custom(backend: B, metadata: M, raster: R, tags: T, config: StackConfig) -> Self {
        Self {
            backend,
            metadata,
            raster,
            tags,
            config,
        }
    }

    /// Resolves and creates the stack and thumbnail directories for `input`.
    pub fn prepare_outputs(&self, input: &Path) -> Result<StackOutputs> {
        let stacks_dir = match &self.config.output_dir {
            Some(dir) => dir.clone(),
            None => scan::sibling_dir(input, STACKS_DIR_NAME)?,
        };
        create_dir(&stacks_dir)?;

        let thumbnail_dir = if self.config.generate_thumbnails {
            let dir = match &self.config.thumbnail_dir {
                Some(dir) => dir.clone(),
                None => scan::sibling_dir(&stacks_dir, THUMBNAILS_DIR_NAME)?,
            };
            create_dir(&dir)?;
            Some(dir)
        } else {
            None
        };

        Ok(StackOutputs {
            stacks_dir,
            thumbnail_dir,
        })
    }

    /// Stacks one capture and releases its buffers, whatever the outcome.
    pub fn process_capture(
        &self,
        capture: &mut Capture,
        reference_bands: usize,
        outputs: &StackOutputs,
        timings: &mut PipelineTimings,
    ) -> Result<CaptureOutcome> {
        let outcome = self.stack_capture(capture, reference_bands, outputs, timings);
        capture.clear_image_data();
        outcome
    }

    #[instrument(skip_all, fields(capture = %capture.prefix(), dir = %capture.dir().display()))]
    fn stack_capture(
        &self,
        capture: &mut Capture,
        reference_bands: usize,
        outputs: &StackOutputs,
        timings: &mut PipelineTimings,
    ) -> Result<CaptureOutcome> {
        let output = outputs.stacks_dir.join(capture.output_name());

        if output.exists() && !self.config.overwrite {
            debug!(output = %output.display(), "Stack exists, skipping");
            return Ok(CaptureOutcome::SkippedExisting(output));
        }
        if capture.band_count() != reference_bands {
            warn!(
                found = capture.band_count(),
                expected = reference_bands,
                "Capture is missing bands, skipping"
            );
            return Ok(CaptureOutcome::SkippedIncomplete {
                found: capture.band_count(),
                expected: reference_bands,
            });
        }

        timings.time("load_capture", || capture.load_image_data(&self.metadata, &self.raster))?;

        if let Some(ground_altitude) = self.config.ground_altitude {
            match capture.altitude() {
                Some(altitude) => info!(flight_altitude = altitude - ground_altitude, "Flight altitude above ground"),
                None => warn!("Capture has no GPS altitude"),
            }
        }

        let irradiance = capture_irradiance(capture.bands(), &self.config.irradiance)?;
        debug!(?irradiance, "Downwelling irradiance");

        let reflectance = timings.time("radiance_to_reflectance", || -> Result<Vec<FloatImage>> {
            let mut bands = Vec::with_capacity(capture.bands().len());
            for (band, irradiance) in capture.bands().iter().zip(&irradiance) {
                let radiance = self.backend.raw_to_radiance(&band.meta, &band.raw)?;
                let mut image = self.backend.correct_lens_distortion(&band.meta, radiance)?;
                if let Some(irradiance) = irradiance {
                    image.scale(PI / irradiance);
                }
                bands.push(image);
            }
            Ok(bands)
        })?;

        let aligned = timings.time("align_bands", || {
            self.backend.align_bands(reflectance, self.config.warp_matrices.as_deref())
        })?;

        timings.time("write_stack", || {
            self.raster.write_stack(&output, &aligned, self.config.compression)
        })?;

        if let Some(thumbnail_dir) = &outputs.thumbnail_dir {
            let [r, g, b] = self.config.rgb_bands;
            match (aligned.get(r), aligned.get(g), aligned.get(b)) {
                (Some(red), Some(green), Some(blue)) => {
                    let path = thumbnail_dir.join(capture.thumbnail_name());
                    timings.time("write_thumbnail", || {
                        self.raster.write_rgb_preview(&path, [red, green, blue])
                    })?;
                }
                _ => warn!(bands = aligned.len(), rgb = ?self.config.rgb_bands, "RGB bands out of range, no thumbnail"),
            }
        }

        if self.config.copy_metadata {
            let source = capture.first_frame().ok_or_else(|| {
                PreprocessError::CaptureError(format!("capture {} has no frames", capture.prefix()))
            })?;
            timings.time("copy_metadata", || copy_exif_data(&self.tags, source, &output))?;
        }

        info!(output = %output.display(), bands = aligned.len(), "Stack written");
        Ok(CaptureOutcome::Written(output))
    }

    /// Stacks every capture found under `input`.
    #[instrument(skip(self, input), fields(input = %input.display()))]
    pub fn run(&self, input: &Path) -> Result<StackReport> {
        let mut report = StackReport::default();
        let mut captures: Vec<Capture> = scan::find_captures(input)?
            .into_iter()
            .map(Capture::from)
            .collect();

        let Some(reference_bands) = captures.first().map(Capture::band_count) else {
            warn!("No captures found");
            return Ok(report);
        };
        let outputs = self.prepare_outputs(input)?;
        info!(
            captures = captures.len(),
            reference_bands,
            stacks = %outputs.stacks_dir.display(),
            "Stacking captures"
        );

        for capture in &mut captures {
            let outcome = self.process_capture(capture, reference_bands, &outputs, &mut report.timings);
            report.buffers_released += 1;
            match outcome? {
                CaptureOutcome::Written(path) => report.written.push(path),
                CaptureOutcome::SkippedExisting(_) => report.skipped_existing += 1,
                CaptureOutcome::SkippedIncomplete { .. } => report.skipped_incomplete += 1,
            }
        }

        info!(
            written = report.written.len(),
            skipped_existing = report.skipped_existing,
            skipped_incomplete = report.skipped_incomplete,
            "Stacking complete"
        );
        Ok(report)
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        PreprocessError::OutputWriteError(format!("{}: {}", dir.display(), e))
    })
}
