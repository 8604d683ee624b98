//! Multispectral preprocessing module
//!
//! Batch preprocessing of multispectral drone imagery: panel calibration,
//! radiance to reflectance conversion, capture stacking with downwelling
//! irradiance, and metadata propagation through `exiftool`.

pub mod common;
pub mod config;
pub mod scan;
pub mod metadata;
pub mod raster;
pub mod imaging;
pub mod calibration;
pub mod capture;
pub mod conversions;

pub use common::{
    PreprocessError,
    Result,
};

pub use config::{
    CameraModel,
    IrradianceMode,
    ReflectanceConfig,
    ReflectanceConfigBuilder,
    StackConfig,
    StackConfigBuilder,
    TiffCompression,
};

pub use metadata::{
    Exiftool,
    Metadata,
    MetadataReader,
    TagCopier,
    copy_exif_data,
};

pub use raster::{
    FloatImage,
    RasterIo,
    RawFrame,
    TiffRasterIo,
};

pub use imaging::{
    BasicImaging,
    Homography,
    ImagingBackend,
    PanelSettings,
};

pub use calibration::{
    PanelCalibration,
    PanelScan,
    panel_detection,
};

pub use capture::Capture;

pub use conversions::{
    CaptureStackPipeline,
    PipelineTimings,
    ReflectancePipeline,
    copy_exif_data_to_stacks,
};
