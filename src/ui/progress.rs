//! Progress indicators for long-running stages
//!
//! Uses `linya`, which draws to stderr. Bars are only shown when stderr is a
//! terminal so logs and CI output stay free of control sequences.

use linya::{Bar, Progress};
use std::io::IsTerminal;

/// Progress bar wrapper for per-file work (descriptor patching)
pub struct FileProgress {
  progress: Progress,
  bar: Bar,
}

impl FileProgress {
  /// Create a new progress bar for file transformations
  pub fn new(total: usize, label: impl Into<String>) -> Self {
    let mut progress = Progress::new();
    let bar = progress.bar(total, label.into());
    Self { progress, bar }
  }

  /// A bar when stderr is interactive and there is work to show
  pub fn for_terminal(total: usize, label: impl Into<String>) -> Option<Self> {
    if total == 0 || !std::io::stderr().is_terminal() {
      return None;
    }
    Some(Self::new(total, label))
  }

  /// Increment progress by 1
  pub fn inc(&mut self) {
    self.progress.inc_and_draw(&self.bar, 1);
  }
}
