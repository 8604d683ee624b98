//! Metadata types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::multispectral::common::error::{PreprocessError, Result};

/// Tag keys as reported by `exiftool -G` (`Group:Tag`).
pub mod tags {
    pub const FILE_NAME: &str = "File:FileName";
    pub const BAND_NAME: &str = "XMP:BandName";
    pub const BLACK_LEVEL: &str = "EXIF:BlackLevel";
    pub const BITS_PER_SAMPLE: &str = "EXIF:BitsPerSample";
    pub const EXPOSURE_TIME: &str = "EXIF:ExposureTime";
    pub const ISO_SPEED: &str = "EXIF:ISOSpeed";
    pub const RADIOMETRIC_CALIBRATION: &str = "XMP:RadiometricCalibration";
    pub const SPECTRAL_IRRADIANCE: &str = "XMP:SpectralIrradiance";
    pub const IRRADIANCE: &str = "XMP:Irradiance";
    pub const GPS_ALTITUDE: &str = "Composite:GPSAltitude";
    pub const EXIF_GPS_ALTITUDE: &str = "EXIF:GPSAltitude";
}

/// Key under which exiftool echoes the file it read.
const SOURCE_FILE_KEY: &str = "SourceFile";

/// EXIF/XMP tags of a single frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    source: PathBuf,
    tags: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new(source: impl Into<PathBuf>, tags: BTreeMap<String, Value>) -> Self {
        Self {
            source: source.into(),
            tags,
        }
    }

    /// Parses the output of `exiftool -j -n -G <file>`.
    pub fn from_exiftool_json(source: &Path, json: &str) -> Result<Self> {
        let mut records: Vec<BTreeMap<String, Value>> = serde_json::from_str(json)?;
        if records.is_empty() {
            return Err(PreprocessError::MetadataError(format!(
                "exiftool returned no records for {}",
                source.display()
            )));
        }
        let mut tags = records.swap_remove(0);
        tags.remove(SOURCE_FILE_KEY);
        Ok(Self::new(source, tags))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get_item(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get_item(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get_item(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Array(values) => values.first().and_then(value_as_f64),
            _ => None,
        }
    }

    /// Reads list-valued tags, which exiftool emits either as JSON arrays or
    /// as space/comma separated strings (`"4800 4800 4800 4800"`).
    pub fn get_f64_list(&self, key: &str) -> Option<Vec<f64>> {
        match self.get_item(key)? {
            Value::Array(values) => values.iter().map(value_as_f64).collect(),
            Value::Number(n) => n.as_f64().map(|v| vec![v]),
            Value::String(s) => s
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|part| !part.is_empty())
                .map(|part| part.parse().ok())
                .collect(),
            _ => None,
        }
    }

    fn missing(&self, key: &str) -> PreprocessError {
        PreprocessError::MissingTag {
            tag: key.to_string(),
            file: self.source.clone(),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_str(key).ok_or_else(|| self.missing(key))
    }

    pub fn require_f64(&self, key: &str) -> Result<f64> {
        self.get_f64(key).ok_or_else(|| self.missing(key))
    }

    pub fn require_f64_list(&self, key: &str) -> Result<Vec<f64>> {
        self.get_f64_list(key).ok_or_else(|| self.missing(key))
    }

    pub fn band_name(&self) -> Result<String> {
        self.require_str(tags::BAND_NAME)
    }

    /// File name as recorded by exiftool, falling back to the source path.
    pub fn file_name(&self) -> Option<String> {
        self.get_str(tags::FILE_NAME).or_else(|| {
            self.source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
    }

    /// Altitude above sea level in metres.
    pub fn altitude(&self) -> Option<f64> {
        self.get_f64(tags::GPS_ALTITUDE)
            .or_else(|| self.get_f64(tags::EXIF_GPS_ALTITUDE))
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
