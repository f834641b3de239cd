//! Build/verification collaborator

use crate::core::error::{ReleaseError, ReleaseResult};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Builds and verifies a working copy
pub trait Builder {
  /// Any failure is fatal to the release
  fn build_and_verify(&self, working_dir: &Path) -> ReleaseResult<()>;
}

/// Runs a configured command (by default Maven) inside the working copy.
///
/// Output is inherited so the operator watches the build live.
pub struct CommandBuilder {
  command: Vec<String>,
}

impl CommandBuilder {
  pub fn new(command: Vec<String>) -> Self {
    Self { command }
  }
}

impl Builder for CommandBuilder {
  fn build_and_verify(&self, working_dir: &Path) -> ReleaseResult<()> {
    let (program, args) = self
      .command
      .split_first()
      .ok_or_else(|| ReleaseError::message("Build command is empty"))?;
    let command_line = self.command.join(" ");

    info!(command = %command_line, dir = %working_dir.display(), "starting build");
    let status = Command::new(program)
      .args(args)
      .current_dir(working_dir)
      .status()
      .map_err(|e| ReleaseError::BuildFailed {
        command: command_line.clone(),
        status: format!("could not start: {}", e),
      })?;

    if !status.success() {
      return Err(ReleaseError::BuildFailed {
        command: command_line,
        status: status.to_string(),
      });
    }

    Ok(())
  }
}
