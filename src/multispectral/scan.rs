//! Directory scanning for capture directories and raw frames.
//!
//! Frames follow the camera's naming convention `IMG_<n>_<band>.tif` and live
//! one level below a dataset root (`<dataset>/<capture-dir>/IMG_*.tif`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::multispectral::common::error::{PreprocessError, Result};

const FRAME_PREFIX: &str = "IMG_";
const FRAME_EXTENSION: &str = ".tif";

/// A frame file name split into its capture prefix and band suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameName {
    /// Shared capture prefix, e.g. `IMG_0001`
    pub prefix: String,
    /// Band suffix, e.g. `1` for `IMG_0001_1.tif`
    pub band: u8,
}

/// All frames sharing one capture prefix within a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFiles {
    pub prefix: String,
    pub dir: PathBuf,
    /// Frames ordered by band suffix
    pub frames: Vec<(u8, PathBuf)>,
}

fn is_frame_file(name: &str) -> bool {
    name.starts_with(FRAME_PREFIX) && name.ends_with(FRAME_EXTENSION)
}

/// Parses `IMG_0001_3.tif` into `("IMG_0001", 3)`.
pub fn parse_frame_name(path: &Path) -> Option<FrameName> {
    let name = path.file_name()?.to_str()?;
    if !is_frame_file(name) {
        return None;
    }
    let stem = name.strip_suffix(FRAME_EXTENSION)?;
    let (prefix, band) = stem.rsplit_once('_')?;
    if prefix.len() <= FRAME_PREFIX.len() {
        return None;
    }
    let band = band.parse::<u8>().ok()?;
    Some(FrameName {
        prefix: prefix.to_string(),
        band,
    })
}

fn require_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(PreprocessError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// `<parent of dir>/<name>`. `dir` is resolved first, so `.` or a path
/// ending in `..` still yields a directory beside it.
pub fn sibling_dir(dir: &Path, name: &str) -> Result<PathBuf> {
    let resolved = fs::canonicalize(dir).map_err(|_| PreprocessError::NotFound(dir.to_path_buf()))?;
    Ok(resolved.parent().unwrap_or(&resolved).join(name))
}

/// Sub-directories of a dataset root, sorted by name.
pub fn capture_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    require_dir(root)?;
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Reorders capture directories so the panel directory is visited first.
///
/// A designated directory (matched by name) moves to the front. Without one,
/// the last directory does, which is where the camera files panel captures
/// taken after the flight.
pub fn calibration_order(mut dirs: Vec<PathBuf>, designated: Option<&str>) -> Vec<PathBuf> {
    let position = match designated {
        Some(name) => dirs
            .iter()
            .position(|d| d.file_name().is_some_and(|n| n == name)),
        None if !dirs.is_empty() => Some(dirs.len() - 1),
        None => None,
    };
    if let Some(position) = position {
        let dir = dirs.remove(position);
        dirs.insert(0, dir);
    }
    dirs
}

/// `IMG_*.tif` frames directly inside `dir`, sorted by name.
pub fn frames_in_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    require_dir(dir)?;
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_frame_file);
        if is_frame && entry.file_type()?.is_file() {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

/// All `<root>/*/IMG_*.tif` frames whose band suffix is not excluded.
pub fn dataset_frames(root: &Path, excluded_bands: &[u8]) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for dir in capture_dirs(root)? {
        for frame in frames_in_dir(&dir)? {
            let excluded = parse_frame_name(&frame)
                .is_some_and(|name| excluded_bands.contains(&name.band));
            if excluded {
                debug!(frame = %frame.display(), "Skipping excluded band");
                continue;
            }
            frames.push(frame);
        }
    }
    Ok(frames)
}

/// Recursively groups frames under `root` into captures, sorted by directory
/// and prefix.
pub fn find_captures(root: &Path) -> Result<Vec<CaptureFiles>> {
    require_dir(root)?;
    let mut groups: BTreeMap<(PathBuf, String), Vec<(u8, PathBuf)>> = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| PreprocessError::InputReadError(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(name) = parse_frame_name(&path) else {
            continue;
        };
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        groups.entry((dir, name.prefix)).or_default().push((name.band, path));
    }

    Ok(groups
        .into_iter()
        .map(|((dir, prefix), mut frames)| {
            frames.sort_by_key(|(band, _)| *band);
            CaptureFiles { prefix, dir, frames }
        })
        .collect())
}

/// Recursively finds frames with the given band suffix.
pub fn find_band_frames(root: &Path, band: u8) -> Result<Vec<PathBuf>> {
    require_dir(root)?;
    let mut frames = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| PreprocessError::InputReadError(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if parse_frame_name(entry.path()).is_some_and(|name| name.band == band) {
            frames.push(entry.into_path());
        }
    }
    frames.sort();
    Ok(frames)
}
