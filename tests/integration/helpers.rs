//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const VERSION_JAVA: &str = r#"package org.infinispan;

public class Version {
   public static final String version = "4.0.0.SNAPSHOT";
   public static final String codename = "Starobrno";
   static final byte[] version_id = {'4', '0', '0', 'S', 'N', 'A', 'P', 'S', 'H', 'O', 'T'};
}
"#;

/// A project tree to release from, with a separate directory for tags
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
  pub tags_dir: PathBuf,
}

impl TestProject {
  /// Create a two-module project with a version source in `core`
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("project");
    let tags_dir = root.path().join("tags");

    write(
      &path.join("pom.xml"),
      r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <modelVersion>4.0.0</modelVersion>
  <groupId>org.infinispan</groupId>
  <artifactId>infinispan-parent</artifactId>
  <version>4.0.0.SNAPSHOT</version>
  <modules>
    <module>core</module>
    <module>tools</module>
  </modules>
  <properties>
    <project-version>4.0.0.SNAPSHOT</project-version>
  </properties>
</project>
"#,
    )?;
    write(
      &path.join("core/pom.xml"),
      r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <parent>
    <groupId>org.infinispan</groupId>
    <artifactId>infinispan-parent</artifactId>
    <version>4.0.0.SNAPSHOT</version>
  </parent>
  <artifactId>infinispan-core</artifactId>
</project>
"#,
    )?;
    write(
      &path.join("tools/pom.xml"),
      r#"<project>
  <parent><version>4.0.0.SNAPSHOT</version></parent>
  <artifactId>infinispan-tools</artifactId>
</project>
"#,
    )?;
    write(&path.join("core/src/main/java/org/infinispan/Version.java"), VERSION_JAVA)?;

    Ok(Self {
      _root: root,
      path,
      tags_dir,
    })
  }

  /// Write tagship.toml with every required key, plus `extra` appended
  pub fn write_config(&self, release_settings: &str, extra: &str) -> Result<()> {
    let config = format!(
      r#"[scm]
base = "https://svn.example.org/repos/infinispan"

[release]
local_tags_dir = "{}"
{}

[project]
name = "infinispan"

[publish]
docs_target = "docs@example.org:/docs_htdocs/infinispan"
artifacts_target = "frs:/home/frs/infinispan"
schema_target = "docs@example.org:/docs_htdocs/infinispan/schemas"

{}
"#,
      self.tags_dir.display(),
      release_settings,
      extra
    );
    std::fs::write(self.path.join("tagship.toml"), config)?;
    Ok(())
  }

  /// Working copy created for `version`
  pub fn working_copy(&self, version: &str) -> PathBuf {
    self.tags_dir.join(version)
  }

  /// Read a file
  pub fn read_file(&self, path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
  }
}

fn write(path: &Path, content: &str) -> Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, content)?;
  Ok(())
}

/// Run tagship and return its output, whatever the exit status
pub fn run_tagship(cwd: &Path, args: &[&str]) -> Result<Output> {
  let tagship_bin = env!("CARGO_BIN_EXE_tagship");

  Command::new(tagship_bin)
    .current_dir(cwd)
    .args(args)
    .env("RUST_LOG", "warn")
    .output()
    .context("Failed to run tagship")
}

/// Run tagship and fail unless it exits successfully
pub fn run_tagship_ok(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = run_tagship(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "tagship command failed: tagship {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}
