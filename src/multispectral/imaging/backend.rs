use crate::multispectral::common::error::Result;
use crate::multispectral::imaging::align::Homography;
use crate::multispectral::imaging::panel::PanelReading;
use crate::multispectral::metadata::Metadata;
use crate::multispectral::raster::{FloatImage, RawFrame};

pub trait ImagingBackend {
    /// Converts raw sensor counts to spectral radiance (°C for thermal bands).
    fn raw_to_radiance(&self, meta: &Metadata, raw: &RawFrame) -> Result<FloatImage>;

    fn correct_lens_distortion(&self, meta: &Metadata, image: FloatImage) -> Result<FloatImage>;

    /// Returns the panel reading when a calibration panel is visible in the frame.
    fn detect_panel(&self, meta: &Metadata, raw: &RawFrame) -> Result<Option<PanelReading>>;

    /// Co-registers bands onto the first band's pixel grid.
    fn align_bands(&self, bands: Vec<FloatImage>, warps: Option<&[Homography]>) -> Result<Vec<FloatImage>>;
}
