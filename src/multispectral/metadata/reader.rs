use std::path::Path;

use crate::multispectral::common::error::Result;
use crate::multispectral::metadata::types::Metadata;

pub trait MetadataReader {
    fn read_metadata(&self, path: &Path) -> Result<Metadata>;
}
