use std::path::Path;

use tracing::instrument;

use crate::multispectral::common::error::{PreprocessError, Result};

/// Copies all metadata tags from one file onto another.
pub trait TagCopier {
    fn copy_tags(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Copies tags from `source` onto `target` after checking both exist.
///
/// Any failure here is meant to abort the batch.
#[instrument(skip(copier))]
pub fn copy_exif_data<T: TagCopier + ?Sized>(copier: &T, source: &Path, target: &Path) -> Result<()> {
    if !source.is_file() {
        return Err(PreprocessError::NotFound(source.to_path_buf()));
    }
    if !target.is_file() {
        return Err(PreprocessError::NotFound(target.to_path_buf()));
    }
    copier.copy_tags(source, target)
}
