//! System svn backend
//!
//! Shells out to the `svn` client. Each operation is one subprocess call run
//! non-interactively with an isolated environment.

use crate::core::error::{ReleaseResult, ScmError};
use crate::core::vcs::Scm;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Variables passed through to `svn`
const INHERITED_ENV: [&str; 4] = ["PATH", "HOME", "SSH_AUTH_SOCK", "SVN_SSH"];

/// Subversion backend using the system `svn` binary
pub struct SystemSvn {
  program: String,
}

impl SystemSvn {
  pub fn new() -> Self {
    Self {
      program: "svn".to_string(),
    }
  }

  /// Use a different client binary (wrappers, absolute paths)
  #[cfg(test)]
  pub fn with_program(program: impl Into<String>) -> Self {
    Self { program: program.into() }
  }

  /// Create a safe svn command with isolated environment
  ///
  /// - Clears environment variables
  /// - Whitelists [`INHERITED_ENV`] (HOME carries the auth cache; the ssh
  ///   agent socket and tunnel override keep `svn+ssh://` working)
  /// - Never prompts
  fn svn_cmd(&self) -> Command {
    self.svn_cmd_with(|key| std::env::var(key).ok())
  }

  fn svn_cmd_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Command {
    let mut cmd = Command::new(&self.program);

    cmd.env_clear();
    for key in INHERITED_ENV {
      if let Some(value) = lookup(key) {
        cmd.env(key, value);
      }
    }
    cmd.env("LC_ALL", "C");

    cmd.arg("--non-interactive");
    cmd
  }

  fn run(&self, mut cmd: Command, description: String) -> ReleaseResult<Output> {
    debug!(command = %description, "running svn");
    let output = cmd.output().map_err(|e| ScmError::Unavailable {
      reason: format!("{}: {}", self.program, e),
    })?;

    if !output.status.success() {
      return Err(
        ScmError::CommandFailed {
          command: description,
          stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into(),
      );
    }

    Ok(output)
  }
}

impl Default for SystemSvn {
  fn default() -> Self {
    Self::new()
  }
}

impl Scm for SystemSvn {
  fn tag(&self, source_ref: &str, dest_ref: &str, version_label: &str) -> ReleaseResult<()> {
    let message = format!("Tagging release {}", version_label);
    let mut cmd = self.svn_cmd();
    cmd.args(["copy", source_ref, dest_ref, "-m", &message]);
    self.run(cmd, format!("svn copy {} {}", source_ref, dest_ref))?;
    Ok(())
  }

  fn checkout(&self, reference: &str, dest_dir: &Path) -> ReleaseResult<()> {
    let mut cmd = self.svn_cmd();
    cmd.args(["checkout", reference]).arg(dest_dir);
    self.run(cmd, format!("svn checkout {} {}", reference, dest_dir.display()))?;
    Ok(())
  }

  fn checkin(&self, dir: &Path, message: &str) -> ReleaseResult<()> {
    let mut cmd = self.svn_cmd();
    cmd.args(["commit", "-m", message]).arg(dir);
    self.run(cmd, format!("svn commit {}", dir.display()))?;
    Ok(())
  }
}
