//! Integration tests for argument and configuration handling

use crate::helpers::{TestProject, run_tagship, stderr, stdout};
use anyhow::Result;

#[test]
fn test_no_version_prints_usage() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true", "")?;

  let output = run_tagship(&project.path, &[])?;
  assert_eq!(output.status.code(), Some(0));
  assert!(stdout(&output).contains("Usage:"));
  assert!(!project.tags_dir.exists(), "nothing should be created");

  Ok(())
}

#[test]
fn test_invalid_version_prints_usage() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true", "")?;

  let output = run_tagship(&project.path, &["4.1"])?;
  assert_eq!(output.status.code(), Some(0));
  assert!(stdout(&output).contains("Usage:"));
  assert!(stderr(&output).contains("Invalid version '4.1'"));
  assert!(!project.tags_dir.exists());

  Ok(())
}

#[test]
fn test_missing_config_exits_2() -> Result<()> {
  let dir = tempfile::tempdir()?;

  let output = run_tagship(dir.path(), &["1.0.0"])?;
  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("tagship.toml"));

  Ok(())
}

#[test]
fn test_config_checked_before_version() -> Result<()> {
  let dir = tempfile::tempdir()?;

  let output = run_tagship(dir.path(), &[])?;
  assert_eq!(output.status.code(), Some(2));

  Ok(())
}

#[test]
fn test_missing_keys_reported_together() -> Result<()> {
  let dir = tempfile::tempdir()?;
  std::fs::write(dir.path().join("tagship.toml"), "[release]\nmulti_threaded = true\n")?;

  let output = run_tagship(dir.path(), &["1.0.0"])?;
  assert_eq!(output.status.code(), Some(2));

  let err = stderr(&output);
  for key in [
    "scm.base",
    "release.local_tags_dir",
    "publish.docs_target",
    "publish.artifacts_target",
    "publish.schema_target",
  ] {
    assert!(err.contains(key), "missing key {} not reported:\n{}", key, err);
  }

  Ok(())
}

#[test]
fn test_help_flag() -> Result<()> {
  let dir = tempfile::tempdir()?;

  let output = run_tagship(dir.path(), &["--help"])?;
  assert_eq!(output.status.code(), Some(0));
  assert!(stdout(&output).contains("VERSION"));

  Ok(())
}
