//! File transfer collaborators (scp, rsync)

use crate::core::error::{ReleaseError, ReleaseResult};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// Moves local files to remote destinations.
///
/// Implementations are shared by concurrent publishing workers.
pub trait Transfer: Send + Sync {
  /// Recursive secure copy of `local` to `remote`
  fn upload(&self, local: &Path, remote: &str) -> ReleaseResult<()>;

  /// Mirror `local` into `remote`
  fn sync(&self, local: &Path, remote: &str) -> ReleaseResult<()>;
}

/// Transfer via the system `scp` and `rsync` binaries
pub struct SystemTransfer {
  scp: String,
  rsync: String,
}

impl SystemTransfer {
  pub fn new() -> Self {
    Self {
      scp: "scp".to_string(),
      rsync: "rsync".to_string(),
    }
  }

  fn run(&self, mut cmd: Command, command_line: String) -> ReleaseResult<()> {
    info!(command = %command_line, "transferring");
    let status = cmd.status().map_err(|e| ReleaseError::Transfer {
      command: command_line.clone(),
      status: format!("could not start: {}", e),
    })?;

    if !status.success() {
      return Err(ReleaseError::Transfer {
        command: command_line,
        status: status.to_string(),
      });
    }
    Ok(())
  }
}

impl Default for SystemTransfer {
  fn default() -> Self {
    Self::new()
  }
}

impl Transfer for SystemTransfer {
  fn upload(&self, local: &Path, remote: &str) -> ReleaseResult<()> {
    let mut cmd = Command::new(&self.scp);
    cmd.arg("-r").arg(local).arg(remote);
    self.run(cmd, format!("{} -r {} {}", self.scp, local.display(), remote))
  }

  fn sync(&self, local: &Path, remote: &str) -> ReleaseResult<()> {
    let mut cmd = Command::new(&self.rsync);
    cmd.args(["-rv", "--protocol=28"]).arg(local).arg(remote);
    self.run(cmd, format!("{} -rv --protocol=28 {} {}", self.rsync, local.display(), remote))
  }
}
