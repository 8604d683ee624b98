//! Frame metadata module
//!
//! Reading EXIF/XMP tags from frames and copying them onto derived outputs,
//! both through the external `exiftool` command.

pub mod types;
mod reader;
mod command;
mod exiftool;
mod propagate;

pub use types::{Metadata, tags};
pub use reader::MetadataReader;
pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use exiftool::{DEFAULT_CONFIG, EXIFTOOL_PATH_ENV, Exiftool};
pub use propagate::{TagCopier, copy_exif_data};
