//! Imaging backend module
//!
//! The radiometric and geometric steps of the pipeline (raw to radiance, lens
//! correction, panel detection, band alignment) sit behind [`ImagingBackend`].
//! [`BasicImaging`] is a first-order implementation driven by frame metadata.

pub mod panel;
pub mod radiometry;
mod align;
mod backend;
mod basic;

pub use align::{Homography, IDENTITY, load_warp_matrices, warp_band};
pub use backend::ImagingBackend;
pub use basic::BasicImaging;
pub use panel::{PanelReading, PanelRegion, PanelSettings, PanelStats};
pub use radiometry::{RadiometricParams, THERMAL_BAND, is_thermal_band};
