//! Common utilities module
//!
//! This module contains shared utilities used across the preprocessing pipeline.

pub mod error;

pub use error::{PreprocessError, Result};
