use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::multispectral::common::error::{PreprocessError, Result};

/// Captured result of an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<CommandOutput>;
}

/// Runs commands as child processes, without a shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<CommandOutput> {
        debug!(program = %program.display(), ?args, "Running external command");

        let output = Command::new(program).args(args).output().map_err(|e| {
            PreprocessError::CommandFailed(format!("{}: {}", program.display(), e))
        })?;

        Ok(CommandOutput {
            status_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
