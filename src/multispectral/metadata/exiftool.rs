//! `exiftool` wrapper used for reading frame metadata and copying tags.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::multispectral::common::error::{PreprocessError, Result};
use crate::multispectral::metadata::command::{CommandOutput, CommandRunner, SystemCommandRunner};
use crate::multispectral::metadata::propagate::TagCopier;
use crate::multispectral::metadata::reader::MetadataReader;
use crate::multispectral::metadata::types::Metadata;

/// Environment variable naming the exiftool executable on Windows.
pub const EXIFTOOL_PATH_ENV: &str = "exiftoolpath";

const DEFAULT_EXECUTABLE: &str = "exiftool";

/// Config file declaring the camera's custom XMP namespace.
pub const DEFAULT_CONFIG: &str = "exiftool.config";

#[derive(Debug, Clone)]
pub struct Exiftool<C: CommandRunner = SystemCommandRunner> {
    executable: PathBuf,
    config: Option<PathBuf>,
    runner: C,
}

impl Exiftool<SystemCommandRunner> {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self::with_runner(executable, SystemCommandRunner)
    }

    /// Resolves the executable from `exiftoolpath` on Windows, `PATH` elsewhere.
    pub fn from_env() -> Self {
        let from_env = if cfg!(windows) {
            std::env::var_os(EXIFTOOL_PATH_ENV).map(PathBuf::from)
        } else {
            None
        };
        Self::new(from_env.unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE)))
    }
}

impl Default for Exiftool<SystemCommandRunner> {
    fn default() -> Self {
        Self::from_env()
    }
}

impl<C: CommandRunner> Exiftool<C> {
    pub fn with_runner(executable: impl Into<PathBuf>, runner: C) -> Self {
        Self {
            executable: executable.into(),
            config: Some(PathBuf::from(DEFAULT_CONFIG)),
            runner,
        }
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    // -config is only honoured as the first argument
    fn base_args(&self) -> Vec<OsString> {
        match &self.config {
            Some(config) => vec!["-config".into(), config.into()],
            None => Vec::new(),
        }
    }

    pub fn read_args(&self, path: &Path) -> Vec<OsString> {
        let mut args = self.base_args();
        let read: [OsString; 4] = ["-j".into(), "-n".into(), "-G".into(), path.into()];
        args.extend(read);
        args
    }

    pub fn copy_args(&self, source: &Path, target: &Path) -> Vec<OsString> {
        let mut args = self.base_args();
        let copy: [OsString; 5] = [
            "-overwrite_original".into(),
            "-TagsFromFile".into(),
            source.into(),
            "-all:all".into(),
            target.into(),
        ];
        args.extend(copy);
        args
    }

    fn run_checked(&self, args: &[OsString]) -> Result<CommandOutput> {
        let output = self.runner.run(&self.executable, args)?;
        if !output.success() {
            return Err(PreprocessError::CommandFailed(format!(
                "{} exited with {:?}: {}",
                self.executable.display(),
                output.status_code,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

impl<C: CommandRunner> MetadataReader for Exiftool<C> {
    #[instrument(skip(self))]
    fn read_metadata(&self, path: &Path) -> Result<Metadata> {
        let output = self.run_checked(&self.read_args(path))?;
        let json = String::from_utf8_lossy(&output.stdout);
        let metadata = Metadata::from_exiftool_json(path, &json)?;
        debug!(tags = metadata.len(), "Read frame metadata");
        Ok(metadata)
    }
}

impl<C: CommandRunner> TagCopier for Exiftool<C> {
    #[instrument(skip(self))]
    fn copy_tags(&self, source: &Path, target: &Path) -> Result<()> {
        self.run_checked(&self.copy_args(source, target))?;
        Ok(())
    }
}
