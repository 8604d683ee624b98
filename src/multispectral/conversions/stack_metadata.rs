use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::metadata::{TagCopier, copy_exif_data};
use crate::multispectral::scan;

/// Band whose frame donates its tags to the stack.
const SOURCE_BAND: u8 = 1;

fn stack_files(stack_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut stacks = Vec::new();
    for entry in fs::read_dir(stack_dir)? {
        let path = entry?.path();
        let is_tiff = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tif"));
        if path.is_file() && is_tiff {
            stacks.push(path);
        }
    }
    stacks.sort();
    Ok(stacks)
}

/// The band-1 frame of the capture a stack was built from.
fn source_for_stack<'a>(stack: &Path, sources: &'a [PathBuf]) -> Result<&'a Path> {
    let stem = stack
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| PreprocessError::InputReadError(format!("{}: invalid stack name", stack.display())))?;
    let capture_prefix = format!("{stem}_");

    sources
        .iter()
        .find(|source| {
            source
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&capture_prefix))
        })
        .map(PathBuf::as_path)
        .ok_or_else(|| {
            PreprocessError::CaptureError(format!("no source frame for stack {}", stack.display()))
        })
}

/// Copies tags from each capture's band-1 frame under `source_dir` onto the
/// matching `<prefix>.tif` in `stack_dir`. Returns the stacks updated.
#[instrument(skip(tags))]
pub fn copy_exif_data_to_stacks<T: TagCopier + ?Sized>(
    tags: &T,
    source_dir: &Path,
    stack_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(PreprocessError::NotFound(source_dir.to_path_buf()));
    }
    if !stack_dir.is_dir() {
        return Err(PreprocessError::NotFound(stack_dir.to_path_buf()));
    }

    let sources = scan::find_band_frames(source_dir, SOURCE_BAND)?;
    let stacks = stack_files(stack_dir)?;
    info!(stacks = stacks.len(), sources = sources.len(), "Copying metadata to stacks");

    for stack in &stacks {
        let source = source_for_stack(stack, &sources)?;
        copy_exif_data(tags, source, stack)?;
    }
    Ok(stacks)
}
