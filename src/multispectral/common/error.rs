use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read input file: {0}")]
    InputReadError(String),
    
    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),
    
    #[error("Failed to decode TIFF frame: {0}")]
    DecodeError(String),
    
    #[error("Failed to encode TIFF image: {0}")]
    EncodeError(String),
    
    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),
    
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Missing metadata tag {tag} in {}", .file.display())]
    MissingTag { tag: String, file: PathBuf },

    #[error("Malformed metadata: {0}")]
    MetadataError(String),

    #[error("Incomplete panel calibration: found {found} of {expected} bands {bands:?}")]
    IncompletePanelCalibration {
        found: usize,
        expected: usize,
        bands: Vec<String>,
    },

    #[error("Invalid panel calibration: {0}")]
    InvalidCalibration(String),

    #[error("No panel reflectance recorded for band {0}")]
    MissingBandCalibration(String),

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("External command failed: {0}")]
    CommandFailed(String),
    
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;
