//! Filesystem helpers shared by the release stages

use crate::core::error::{ReleaseResult, ResultExt};
use glob::Pattern;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Write `contents` to `<path>.tmp`, then rename it over `path`.
///
/// Readers observe either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> ReleaseResult<()> {
  let mut tmp_name = path.as_os_str().to_owned();
  tmp_name.push(".tmp");
  let tmp = PathBuf::from(tmp_name);

  fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
  fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
  Ok(())
}

/// Recursively copy `src` into `dst`, skipping entries whose file name
/// matches any of `ignore`. `dst` must not exist yet.
pub fn copy_tree(src: &Path, dst: &Path, ignore: &[Pattern]) -> ReleaseResult<usize> {
  if dst.exists() {
    return Err(format!("Refusing to copy into existing directory {}", dst.display()).into());
  }
  fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

  let mut copied = 0;
  let mut entries: Vec<_> = fs::read_dir(src)
    .with_context(|| format!("Failed to read {}", src.display()))?
    .collect::<Result<_, _>>()?;
  entries.sort_by_key(|e| e.file_name());

  for entry in entries {
    let name = entry.file_name();
    let name_str = name.to_string_lossy();
    if ignore.iter().any(|p| p.matches(&name_str)) {
      continue;
    }

    let from = entry.path();
    let to = dst.join(&name);
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      copied += copy_tree(&from, &to, ignore)?;
    } else if file_type.is_symlink() {
      let target = fs::read_link(&from)?;
      symlink(&target, &to).with_context(|| format!("Failed to link {}", to.display()))?;
      copied += 1;
    } else {
      fs::copy(&from, &to).with_context(|| format!("Failed to copy {}", from.display()))?;
      copied += 1;
    }
  }

  Ok(copied)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
  fs::copy(target, link).map(|_| ())
}

/// Lexically normalize a path: drop `.` components and trailing separators,
/// resolve `..` against preceding normal components.
pub fn normalize_path(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if matches!(out.components().next_back(), Some(Component::Normal(_))) {
          out.pop();
        } else {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_write_atomic_replaces_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("Version.java");
    fs::write(&file, "old").unwrap();

    write_atomic(&file, b"new").unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "new");
    assert!(!dir.path().join("Version.java.tmp").exists());
  }

  #[test]
  fn test_copy_tree_with_ignore() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("dist");
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::create_dir_all(src.join(".svn")).unwrap();
    fs::write(src.join("app-all.zip"), "zip").unwrap();
    fs::write(src.join("app.pom"), "pom").unwrap();
    fs::write(src.join("app-all.zip.sha1"), "sha").unwrap();
    fs::write(src.join("lib/core.jar"), "jar").unwrap();
    fs::write(src.join("lib/pom.xml"), "xml").unwrap();
    fs::write(src.join(".svn/entries"), "svn").unwrap();

    let ignore: Vec<Pattern> = ["*.xml", "*.sha1", "*.md5", "*.pom", ".svn"]
      .iter()
      .map(|p| Pattern::new(p).unwrap())
      .collect();
    let dst = dir.path().join("staging/1.0.0");
    let copied = copy_tree(&src, &dst, &ignore).unwrap();

    assert_eq!(copied, 2);
    assert!(dst.join("app-all.zip").exists());
    assert!(dst.join("lib/core.jar").exists());
    assert!(!dst.join("app.pom").exists());
    assert!(!dst.join("app-all.zip.sha1").exists());
    assert!(!dst.join("lib/pom.xml").exists());
    assert!(!dst.join(".svn").exists());
  }

  #[test]
  fn test_copy_tree_refuses_existing_destination() {
    let dir = tempfile::tempdir().unwrap();
    assert!(copy_tree(dir.path(), dir.path(), &[]).is_err());
  }

  #[test]
  fn test_normalize_path() {
    assert_eq!(normalize_path(Path::new("/w/./core/")), PathBuf::from("/w/core"));
    assert_eq!(normalize_path(Path::new("/w/a/../b/pom.xml")), PathBuf::from("/w/b/pom.xml"));
    assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
  }
}
