//! Raster I/O module
//!
//! Decoding single-band sensor frames and encoding reflectance rasters,
//! multi-band stacks and RGB previews.

pub mod types;
mod io;
mod tiff_raster_io;
mod thumbnail;

pub use types::{FloatImage, RawFrame};
pub use io::RasterIo;
pub use tiff_raster_io::TiffRasterIo;
pub use thumbnail::render_rgb_preview;
