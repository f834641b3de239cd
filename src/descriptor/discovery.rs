//! Descriptor discovery for a working copy
//!
//! The root descriptor only declares its direct children, and some
//! descriptors (aggregators added without updating the parent, poms under
//! non-module subtrees) are not declared anywhere. Discovery therefore takes
//! the declared modules first and then sweeps the whole tree for anything
//! else named like a descriptor.

use crate::core::error::{DescriptorError, ReleaseError, ReleaseResult};
use crate::descriptor::ModuleDescriptor;
use crate::utils::normalize_path;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ordered, de-duplicated descriptor locations. The root is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSet {
  paths: Vec<PathBuf>,
}

impl ModuleSet {
  fn new(root: PathBuf) -> Self {
    Self { paths: vec![root] }
  }

  /// Append unless already present; returns whether it was added
  fn push(&mut self, path: PathBuf) -> bool {
    if self.paths.contains(&path) {
      return false;
    }
    self.paths.push(path);
    true
  }

  pub fn root(&self) -> &Path {
    &self.paths[0]
  }

  pub fn paths(&self) -> &[PathBuf] {
    &self.paths
  }

  pub fn len(&self) -> usize {
    self.paths.len()
  }
}

impl<'a> IntoIterator for &'a ModuleSet {
  type Item = &'a PathBuf;
  type IntoIter = std::slice::Iter<'a, PathBuf>;

  fn into_iter(self) -> Self::IntoIter {
    self.paths.iter()
  }
}

/// Find every descriptor named `descriptor_name` under `root_dir`.
pub fn discover(root_dir: &Path, descriptor_name: &str) -> ReleaseResult<ModuleSet> {
  let root_dir = normalize_path(root_dir);
  let root_path = root_dir.join(descriptor_name);
  info!(path = %root_path.display(), "parsing root descriptor for module list");

  if !root_path.is_file() {
    return Err(
      DescriptorError::MissingRoot {
        path: root_path,
        reason: "file not found".to_string(),
      }
      .into(),
    );
  }
  let root = ModuleDescriptor::load(&root_path).map_err(|e| DescriptorError::MissingRoot {
    path: root_path.clone(),
    reason: e.to_string(),
  })?;

  let declared = root.declared_modules();
  info!(modules = ?declared, "available modules");

  let mut set = ModuleSet::new(root_path);
  for name in declared {
    let path = normalize_path(&root_dir.join(name).join(descriptor_name));
    if !path.is_file() {
      return Err(
        DescriptorError::MissingModule {
          name: name.clone(),
          path,
        }
        .into(),
      );
    }
    set.push(path);
  }

  let declared_count = set.len();
  for path in scan_tree(&root_dir, descriptor_name)? {
    if set.push(normalize_path(&path)) {
      debug!(path = %path.display(), "found descriptor not declared as a module");
    }
  }
  info!(
    declared = declared_count,
    undeclared = set.len() - declared_count,
    "descriptors to patch"
  );

  Ok(set)
}

/// Every file named `descriptor_name` at any depth, hidden directories excluded
fn scan_tree(root_dir: &Path, descriptor_name: &str) -> ReleaseResult<Vec<PathBuf>> {
  let root_str = root_dir
    .to_str()
    .ok_or_else(|| ReleaseError::message(format!("Working directory is not valid UTF-8: {}", root_dir.display())))?;
  let pattern = format!("{}/**/{}", Pattern::escape(root_str), Pattern::escape(descriptor_name));

  let options = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
  };

  let mut found = Vec::new();
  for entry in glob::glob_with(&pattern, options)? {
    let path = entry?;
    if path.is_file() && !is_hidden(root_dir, &path) {
      found.push(path);
    }
  }
  Ok(found)
}

fn is_hidden(root_dir: &Path, path: &Path) -> bool {
  path
    .strip_prefix(root_dir)
    .map(|rel| rel.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')))
    .unwrap_or(false)
}
