//! Capture types

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::multispectral::common::error::Result;
use crate::multispectral::metadata::{Metadata, MetadataReader};
use crate::multispectral::raster::{RasterIo, RawFrame};
use crate::multispectral::scan::CaptureFiles;

/// One band of a capture with its decoded frame and metadata
#[derive(Debug, Clone)]
pub struct LoadedBand {
    /// Band suffix of the frame file
    pub band: u8,
    pub path: PathBuf,
    pub meta: Metadata,
    pub raw: RawFrame,
}

impl LoadedBand {
    pub fn buffer_bytes(&self) -> usize {
        self.raw.data.capacity() * std::mem::size_of::<u16>()
    }
}

/// Frames sharing a prefix, plus their pixel data while the capture is being processed.
#[derive(Debug, Clone)]
pub struct Capture {
    prefix: String,
    dir: PathBuf,
    frames: Vec<(u8, PathBuf)>,
    bands: Vec<LoadedBand>,
    releases: usize,
}

impl From<CaptureFiles> for Capture {
    fn from(files: CaptureFiles) -> Self {
        Self {
            prefix: files.prefix,
            dir: files.dir,
            frames: files.frames,
            bands: Vec::new(),
            releases: 0,
        }
    }
}

impl Capture {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn band_count(&self) -> usize {
        self.frames.len()
    }

    /// Frame of the lowest band, the source of the stack's metadata.
    pub fn first_frame(&self) -> Option<&Path> {
        self.frames.first().map(|(_, path)| path.as_path())
    }

    /// Stack file name, `<prefix>.tif`.
    pub fn output_name(&self) -> String {
        format!("{}.tif", self.prefix)
    }

    pub fn thumbnail_name(&self) -> String {
        format!("{}.jpg", self.prefix)
    }

    /// Decodes every frame and reads its metadata. No-op when already loaded.
    pub fn load_image_data<M, R>(&mut self, metadata: &M, raster: &R) -> Result<()>
    where
        M: MetadataReader + ?Sized,
        R: RasterIo + ?Sized,
    {
        if self.has_image_data() {
            return Ok(());
        }
        let mut bands = Vec::with_capacity(self.frames.len());
        for (band, path) in &self.frames {
            bands.push(LoadedBand {
                band: *band,
                path: path.clone(),
                meta: metadata.read_metadata(path)?,
                raw: raster.read_frame(path)?,
            });
        }
        self.bands = bands;
        Ok(())
    }

    pub fn bands(&self) -> &[LoadedBand] {
        &self.bands
    }

    pub fn has_image_data(&self) -> bool {
        !self.bands.is_empty()
    }

    /// Drops the decoded frames, returning the number of pixel bytes freed.
    pub fn clear_image_data(&mut self) -> usize {
        let bytes = self.bands.iter().map(LoadedBand::buffer_bytes).sum();
        self.bands = Vec::new();
        self.releases += 1;
        debug!(capture = %self.prefix, bytes, "Released capture buffers");
        bytes
    }

    /// How many times the buffers were released.
    pub fn release_count(&self) -> usize {
        self.releases
    }

    /// GPS altitude above sea level of the first loaded band.
    pub fn altitude(&self) -> Option<f64> {
        self.bands.first().and_then(|band| band.meta.altitude())
    }
}
