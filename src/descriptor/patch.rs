//! Version patching for a single descriptor

use crate::core::error::ReleaseResult;
use crate::core::version::Version;
use crate::descriptor::normalize::normalize_namespace_prefixes;
use crate::descriptor::{ModuleDescriptor, VersionField};
use crate::utils::write_atomic;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of patching one descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
  /// At least one version field was present and set
  pub changed: bool,
  /// Fields that were set, in document order
  pub fields: Vec<VersionField>,
}

/// Set every present version field of `descriptor` to `version`.
///
/// A descriptor without version fields is left alone on disk. Otherwise
/// the file is rewritten atomically, unless the rendered bytes are already
/// identical.
pub fn patch(descriptor: &ModuleDescriptor, version: &Version) -> ReleaseResult<PatchResult> {
  if descriptor.version_fields().is_empty() {
    debug!(path = %descriptor.path().display(), "no version fields, nothing replaced");
    return Ok(PatchResult {
      changed: false,
      fields: Vec::new(),
    });
  }

  for (field, current) in descriptor.version_fields() {
    debug!(
      path = %descriptor.path().display(),
      field = ?field,
      from = %current,
      to = %version,
      "setting version field"
    );
  }

  let rendered = descriptor.render(version.as_str())?;
  let normalized = normalize_namespace_prefixes(&rendered);
  if normalized != descriptor.content() {
    write_atomic(descriptor.path(), normalized.as_bytes())?;
    info!(path = %descriptor.path().display(), "updated");
  }

  Ok(PatchResult {
    changed: true,
    fields: descriptor.version_fields().iter().map(|(field, _)| *field).collect(),
  })
}

/// Load and patch the descriptor at `path`
pub fn patch_file(path: &Path, version: &Version) -> ReleaseResult<PatchResult> {
  let descriptor = ModuleDescriptor::load(path)?;
  patch(&descriptor, version)
}
