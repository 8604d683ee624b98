use std::path::Path;

use crate::multispectral::common::error::Result;
use crate::multispectral::config::TiffCompression;
use crate::multispectral::raster::types::{FloatImage, RawFrame};

pub trait RasterIo {
    fn read_frame(&self, path: &Path) -> Result<RawFrame>;
    fn write_band(&self, path: &Path, image: &FloatImage, compression: TiffCompression) -> Result<()>;
    fn write_stack(&self, path: &Path, bands: &[FloatImage], compression: TiffCompression) -> Result<()>;
    fn write_rgb_preview(&self, path: &Path, rgb: [&FloatImage; 3]) -> Result<()>;
}
