//! Captures: the co-temporal single-band frames of one shutter trigger.

pub mod types;
mod irradiance;

pub use types::{Capture, LoadedBand};
pub use irradiance::{capture_irradiance, dls_irradiance};
