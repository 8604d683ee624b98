//! Pipeline conversions module
//!
//! Batch orchestration: panel-calibrated reflectance conversion, capture
//! stacking, and propagating frame metadata onto the results.

mod timing;
mod radiance_to_reflectance;
mod capture_stack;
mod stack_metadata;

#[cfg(test)]
mod tests;

pub use timing::{PipelineTimings, StepTiming, Timer};
pub use radiance_to_reflectance::{ReflectancePipeline, ReflectanceReport};
pub use capture_stack::{CaptureOutcome, CaptureStackPipeline, StackOutputs, StackReport};
pub use stack_metadata::copy_exif_data_to_stacks;
