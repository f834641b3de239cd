pub mod system_svn;

pub use system_svn::SystemSvn;

use crate::core::error::ReleaseResult;
use std::path::Path;

/// Source control operations the release pipeline depends on.
///
/// Every call is synchronous and either succeeds completely or returns an
/// error; there is no partial success.
pub trait Scm {
  /// Create an immutable copy of `source_ref` at `dest_ref`
  fn tag(&self, source_ref: &str, dest_ref: &str, version_label: &str) -> ReleaseResult<()>;

  /// Materialize `reference` into `dest_dir`
  fn checkout(&self, reference: &str, dest_dir: &Path) -> ReleaseResult<()>;

  /// Commit every change under `dir`
  fn checkin(&self, dir: &Path, message: &str) -> ReleaseResult<()>;
}
