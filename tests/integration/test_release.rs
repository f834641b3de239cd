//! Integration tests for dry-run releases through the binary

use crate::helpers::{TestProject, run_tagship, run_tagship_ok, stderr, stdout};
use anyhow::Result;

#[test]
fn test_dry_run_release() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true\nmulti_threaded = true", "[build]\ncommand = [\"true\"]")?;

  let output = run_tagship_ok(&project.path, &["9.9.9.final"])?;
  let out = stdout(&output);
  assert!(out.contains("Step 1: Tagging trunk"));
  assert!(out.contains("Step 9: Complete"));
  assert!(out.contains("Release 9.9.9.FINAL completed"));
  assert!(out.contains("Dry run complete"));

  let working = project.working_copy("9.9.9.FINAL");
  for pom in ["pom.xml", "core/pom.xml", "tools/pom.xml"] {
    let content = project.read_file(&working.join(pom))?;
    assert!(content.contains("9.9.9.FINAL"), "{} not patched", pom);
    assert!(!content.contains("4.0.0.SNAPSHOT"), "{} still has the old version", pom);
  }

  let root = project.read_file(&working.join("pom.xml"))?;
  assert!(root.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
  assert!(root.contains("<project-version>9.9.9.FINAL</project-version>"));
  assert!(root.contains("<groupId>org.infinispan</groupId>"));

  let version_java = project.read_file(&working.join("core/src/main/java/org/infinispan/Version.java"))?;
  assert!(version_java.contains("public static final String version = \"9.9.9.FINAL\";"));
  assert!(version_java.contains("version_id = {'9', '9', '9', 'F', 'I', 'N', 'A', 'L'};"));
  assert!(version_java.contains("codename = \"Starobrno\";"));

  // The source tree is left alone
  let origin = project.read_file(&project.path.join("pom.xml"))?;
  assert!(origin.contains("4.0.0.SNAPSHOT"));

  Ok(())
}

#[test]
fn test_existing_working_copy_is_rejected() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true", "[build]\ncommand = [\"true\"]")?;

  run_tagship_ok(&project.path, &["1.0.0"])?;
  let output = run_tagship(&project.path, &["1.0.0"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("already exists"));

  Ok(())
}

#[test]
fn test_build_failure_exits_1() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true", "[build]\ncommand = [\"false\"]")?;

  let output = run_tagship(&project.path, &["1.0.0"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Build failed"));
  assert!(!stdout(&output).contains("Step 8"));

  Ok(())
}

#[test]
fn test_missing_version_source_exits_1() -> Result<()> {
  let project = TestProject::new()?;
  project.write_config("dry_run = true", "[build]\ncommand = [\"true\"]")?;
  std::fs::remove_file(project.path.join("core/src/main/java/org/infinispan/Version.java"))?;

  let output = run_tagship(&project.path, &["1.0.0"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Version source file not found"));

  Ok(())
}
