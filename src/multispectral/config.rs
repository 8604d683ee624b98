//! Batch configuration types

use std::path::PathBuf;

use crate::multispectral::imaging::Homography;

/// Camera models with a known panel band count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraModel {
    /// MicaSense Altum: five reflective bands plus LWIR (no panel for LWIR)
    #[default]
    Altum,
    /// MicaSense RedEdge / RedEdge-M / RedEdge-MX
    RedEdge,
    /// RedEdge-MX dual camera system
    RedEdgeMxDual,
}

impl CameraModel {
    /// Number of distinct bands a complete panel calibration must cover.
    pub fn expected_panel_bands(&self) -> usize {
        match self {
            CameraModel::Altum => 5,
            CameraModel::RedEdge => 5,
            CameraModel::RedEdgeMxDual => 10,
        }
    }

    /// Band suffixes left out of reflectance conversion unless overridden.
    ///
    /// Only the Altum carries a thermal imager, on band 6. The dual system's
    /// band 6 is its first reflective blue band.
    pub fn default_excluded_bands(&self) -> Vec<u8> {
        match self {
            CameraModel::Altum => vec![6],
            CameraModel::RedEdge | CameraModel::RedEdgeMxDual => Vec::new(),
        }
    }
}

/// TIFF compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - best compression (slower)
    DeflateBest,
    /// Deflate compression - balanced
    DeflateBalanced,
}

/// Where per-band irradiance for a capture comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum IrradianceMode {
    /// Use the downwelling light sensor reading as recorded.
    #[default]
    Direct,
    /// Multiply each band's DLS reading by a fixed coefficient (band order).
    Scaled(Vec<f64>),
}

/// Configuration for the radiance to reflectance batch
#[derive(Debug, Clone)]
pub struct ReflectanceConfig {
    pub camera: CameraModel,
    /// Band suffixes (`IMG_0001_<band>.tif`) left out of the conversion;
    /// defaults to the camera's thermal band
    pub excluded_bands: Vec<u8>,
    /// Capture directory holding the panel frames; scanned first
    pub calibration_dir: Option<String>,
    /// Output root; defaults to `<dataset>/../_radiance_to_reflectance`
    pub output_dir: Option<PathBuf>,
    pub compression: TiffCompression,
    /// Whether to reject zero-sized frames before conversion
    pub validate_dimensions: bool,
}

impl Default for ReflectanceConfig {
    fn default() -> Self {
        Self {
            camera: CameraModel::Altum,
            excluded_bands: CameraModel::Altum.default_excluded_bands(),
            calibration_dir: None,
            output_dir: None,
            compression: TiffCompression::None,
            validate_dimensions: true,
        }
    }
}

impl ReflectanceConfig {
    pub fn builder() -> ReflectanceConfigBuilder {
        ReflectanceConfigBuilder::default()
    }
}

/// Builder for ReflectanceConfig
#[derive(Default)]
pub struct ReflectanceConfigBuilder {
    camera: Option<CameraModel>,
    excluded_bands: Option<Vec<u8>>,
    calibration_dir: Option<Option<String>>,
    output_dir: Option<Option<PathBuf>>,
    compression: Option<TiffCompression>,
    validate_dimensions: Option<bool>,
}

impl ReflectanceConfigBuilder {
    pub fn camera(mut self, camera: CameraModel) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn excluded_bands(mut self, bands: Vec<u8>) -> Self {
        self.excluded_bands = Some(bands);
        self
    }

    pub fn calibration_dir(mut self, dir: Option<String>) -> Self {
        self.calibration_dir = Some(dir);
        self
    }

    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn build(self) -> ReflectanceConfig {
        let default = ReflectanceConfig::default();
        let camera = self.camera.unwrap_or(default.camera);
        ReflectanceConfig {
            camera,
            excluded_bands: self
                .excluded_bands
                .unwrap_or_else(|| camera.default_excluded_bands()),
            calibration_dir: self.calibration_dir.unwrap_or(default.calibration_dir),
            output_dir: self.output_dir.unwrap_or(default.output_dir),
            compression: self.compression.unwrap_or(default.compression),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
        }
    }
}

/// Configuration for the capture stacking batch
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Rewrite stacks that already exist
    pub overwrite: bool,
    pub generate_thumbnails: bool,
    pub irradiance: IrradianceMode,
    /// One warp per band; identity alignment when absent
    pub warp_matrices: Option<Vec<Homography>>,
    /// Ground altitude above sea level in metres, used to log flight altitude
    pub ground_altitude: Option<f64>,
    /// Stack directory; defaults to `<input>/../stacks`
    pub output_dir: Option<PathBuf>,
    /// Thumbnail directory; defaults to `<stacks>/../thumbnails`
    pub thumbnail_dir: Option<PathBuf>,
    /// Copy tags from the first band frame onto each written stack
    pub copy_metadata: bool,
    /// Band positions rendered as red, green and blue in thumbnails
    pub rgb_bands: [usize; 3],
    pub compression: TiffCompression,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            generate_thumbnails: true,
            irradiance: IrradianceMode::Direct,
            warp_matrices: None,
            ground_altitude: None,
            output_dir: None,
            thumbnail_dir: None,
            copy_metadata: false,
            rgb_bands: [2, 1, 0],
            compression: TiffCompression::None,
        }
    }
}

impl StackConfig {
    pub fn builder() -> StackConfigBuilder {
        StackConfigBuilder::default()
    }
}

/// Builder for StackConfig
#[derive(Default)]
pub struct StackConfigBuilder {
    overwrite: Option<bool>,
    generate_thumbnails: Option<bool>,
    irradiance: Option<IrradianceMode>,
    warp_matrices: Option<Option<Vec<Homography>>>,
    ground_altitude: Option<Option<f64>>,
    output_dir: Option<Option<PathBuf>>,
    thumbnail_dir: Option<Option<PathBuf>>,
    copy_metadata: Option<bool>,
    rgb_bands: Option<[usize; 3]>,
    compression: Option<TiffCompression>,
}

impl StackConfigBuilder {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn generate_thumbnails(mut self, enable: bool) -> Self {
        self.generate_thumbnails = Some(enable);
        self
    }

    pub fn irradiance(mut self, mode: IrradianceMode) -> Self {
        self.irradiance = Some(mode);
        self
    }

    pub fn warp_matrices(mut self, warps: Option<Vec<Homography>>) -> Self {
        self.warp_matrices = Some(warps);
        self
    }

    pub fn ground_altitude(mut self, altitude: Option<f64>) -> Self {
        self.ground_altitude = Some(altitude);
        self
    }

    pub fn output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn thumbnail_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.thumbnail_dir = Some(dir);
        self
    }

    pub fn copy_metadata(mut self, enable: bool) -> Self {
        self.copy_metadata = Some(enable);
        self
    }

    pub fn rgb_bands(mut self, bands: [usize; 3]) -> Self {
        self.rgb_bands = Some(bands);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn build(self) -> StackConfig {
        let default = StackConfig::default();
        StackConfig {
            overwrite: self.overwrite.unwrap_or(default.overwrite),
            generate_thumbnails: self.generate_thumbnails.unwrap_or(default.generate_thumbnails),
            irradiance: self.irradiance.unwrap_or(default.irradiance),
            warp_matrices: self.warp_matrices.unwrap_or(default.warp_matrices),
            ground_altitude: self.ground_altitude.unwrap_or(default.ground_altitude),
            output_dir: self.output_dir.unwrap_or(default.output_dir),
            thumbnail_dir: self.thumbnail_dir.unwrap_or(default.thumbnail_dir),
            copy_metadata: self.copy_metadata.unwrap_or(default.copy_metadata),
            rgb_bands: self.rgb_bands.unwrap_or(default.rgb_bands),
            compression: self.compression.unwrap_or(default.compression),
        }
    }
}
