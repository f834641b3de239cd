//! Release context - build once, pass everywhere
//!
//! `ReleaseContext` is the immutable snapshot of a single release run. It is
//! built in the command layer after the version is validated and the
//! configuration passed its pre-flight check, and is then only ever read.
//! Publishing workers get it through an `Arc`.

use crate::core::config::TagshipConfig;
use crate::core::version::Version;
use std::path::{Path, PathBuf};

/// Whether the run talks to the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
  /// Tag, checkout, commit and upload for real
  Real,
  /// Copy the current tree, skip SCM mutations and uploads
  DryRun,
}

/// How publishing tasks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
  /// One after another on the pipeline thread
  Inline,
  /// One worker thread per task, joined at the barrier
  Background,
}

#[derive(Debug, Clone)]
pub struct ReleaseContext {
  /// Validated release version
  pub version: Version,

  /// Fresh working copy of the tagged snapshot: `<local_tags_dir>/<version>`
  pub working_dir: PathBuf,

  /// Directory the release was started from
  pub origin_dir: PathBuf,

  pub mode: ExecutionMode,

  pub concurrency: Concurrency,
}

impl ReleaseContext {
  pub fn new(version: Version, working_dir: PathBuf, origin_dir: PathBuf, mode: ExecutionMode, concurrency: Concurrency) -> Self {
    Self {
      version,
      working_dir,
      origin_dir,
      mode,
      concurrency,
    }
  }

  /// Derive the context from configuration
  pub fn from_config(version: Version, origin_dir: &Path, config: &TagshipConfig) -> Self {
    let tags_dir = config
      .release
      .local_tags_dir
      .clone()
      .unwrap_or_else(|| origin_dir.join("tags"));
    let tags_dir = if tags_dir.is_absolute() {
      tags_dir
    } else {
      origin_dir.join(tags_dir)
    };

    let mode = if config.release.dry_run {
      ExecutionMode::DryRun
    } else {
      ExecutionMode::Real
    };
    let concurrency = if config.release.multi_threaded {
      Concurrency::Background
    } else {
      Concurrency::Inline
    };

    Self::new(
      version.clone(),
      tags_dir.join(version.as_str()),
      origin_dir.to_path_buf(),
      mode,
      concurrency,
    )
  }

  pub fn is_dry_run(&self) -> bool {
    self.mode == ExecutionMode::DryRun
  }

  /// Build output directory inside the working copy
  pub fn distribution_dir(&self) -> PathBuf {
    self.working_dir.join("target").join("distribution")
  }
}
