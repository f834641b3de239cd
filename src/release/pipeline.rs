//! The release state machine
//!
//! One run moves strictly forward through
//! `Start → Tag → Checkout → Discover → Patch → Stamp → Commit → Build →
//! Publish → Join → Done`. Any error moves it to `Failed` and stops; nothing
//! already done (tag, commit, uploads) is undone.

use crate::core::builder::Builder;
use crate::core::config::TagshipConfig;
use crate::core::context::ReleaseContext;
use crate::core::error::{ReleaseError, ReleaseResult};
use crate::core::transfer::Transfer;
use crate::core::vcs::Scm;
use crate::descriptor::{self, ModuleDescriptor, ModuleSet};
use crate::release::publish::{self, PublishPlan};
use crate::release::scheduler::TaskScheduler;
use crate::stamp;
use crate::ui::progress::FileProgress;
use crate::utils::{copy_tree, normalize_path};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
  Start,
  Tag,
  Checkout,
  Discover,
  Patch,
  Stamp,
  Commit,
  Build,
  Publish,
  Join,
  Done,
  Failed,
}

impl Stage {
  fn label(self) -> &'static str {
    match self {
      Stage::Start => "Starting",
      Stage::Tag => "Tagging trunk",
      Stage::Checkout => "Checking out the tag",
      Stage::Discover => "Discovering module descriptors",
      Stage::Patch => "Updating version in descriptors",
      Stage::Stamp => "Stamping version source",
      Stage::Commit => "Committing version changes",
      Stage::Build => "Building and verifying",
      Stage::Publish => "Publishing docs, artifacts and schemas",
      Stage::Join => "Waiting for publishing tasks",
      Stage::Done => "Done",
      Stage::Failed => "Failed",
    }
  }
}

/// Summary of a finished release
#[derive(Debug, Clone)]
pub struct ReleaseReport {
  pub version: String,
  pub working_dir: PathBuf,
  pub started_at: DateTime<Local>,
  pub finished_at: DateTime<Local>,
  pub descriptors: usize,
  pub descriptors_changed: usize,
  pub published: Vec<String>,
  pub history: Vec<Stage>,
}

impl ReleaseReport {
  pub fn elapsed(&self) -> Duration {
    (self.finished_at - self.started_at).to_std().unwrap_or_default()
  }
}

#[derive(Debug, Default)]
struct Progress {
  descriptors: usize,
  descriptors_changed: usize,
  published: Vec<String>,
}

pub struct ReleasePipeline {
  ctx: ReleaseContext,
  config: TagshipConfig,
  scm: Box<dyn Scm>,
  builder: Box<dyn Builder>,
  transfer: Arc<dyn Transfer>,
  stage: Stage,
  history: Vec<Stage>,
}

impl ReleasePipeline {
  pub fn new(
    ctx: ReleaseContext,
    config: TagshipConfig,
    scm: Box<dyn Scm>,
    builder: Box<dyn Builder>,
    transfer: Arc<dyn Transfer>,
  ) -> Self {
    Self {
      ctx,
      config,
      scm,
      builder,
      transfer,
      stage: Stage::Start,
      history: vec![Stage::Start],
    }
  }

  pub fn stage(&self) -> Stage {
    self.stage
  }

  /// Every stage entered so far, in order
  pub fn history(&self) -> &[Stage] {
    &self.history
  }

  pub fn context(&self) -> &ReleaseContext {
    &self.ctx
  }

  /// Execute the whole release. On error the pipeline ends in `Failed`.
  pub fn run(&mut self) -> ReleaseResult<ReleaseReport> {
    let started_at = Local::now();
    info!(
      version = %self.ctx.version,
      working_dir = %self.ctx.working_dir.display(),
      mode = ?self.ctx.mode,
      concurrency = ?self.ctx.concurrency,
      "release started"
    );

    match self.execute() {
      Ok(progress) => {
        self.enter(Stage::Done);
        Ok(ReleaseReport {
          version: self.ctx.version.to_string(),
          working_dir: self.ctx.working_dir.clone(),
          started_at,
          finished_at: Local::now(),
          descriptors: progress.descriptors,
          descriptors_changed: progress.descriptors_changed,
          published: progress.published,
          history: self.history.clone(),
        })
      }
      Err(e) => {
        info!(stage = ?self.stage, "release failed");
        self.enter(Stage::Failed);
        Err(e)
      }
    }
  }

  fn execute(&mut self) -> ReleaseResult<Progress> {
    self.preflight()?;
    let mut progress = Progress::default();

    self.step(Stage::Tag, |p| p.tag())?;
    self.step(Stage::Checkout, |p| p.checkout())?;
    let modules = self.step(Stage::Discover, |p| p.discover())?;
    progress.descriptors = modules.len();
    progress.descriptors_changed = self.step(Stage::Patch, |p| p.patch(&modules))?;
    self.step(Stage::Stamp, |p| p.stamp(&modules))?;
    self.step(Stage::Commit, |p| p.commit())?;
    self.step(Stage::Build, |p| p.builder.build_and_verify(&p.ctx.working_dir))?;
    let scheduler = self.step(Stage::Publish, |p| p.publish())?;
    progress.published = self.step(Stage::Join, |_| scheduler.join())?.completed;

    Ok(progress)
  }

  fn enter(&mut self, next: Stage) {
    debug_assert!(next > self.stage, "stage {:?} after {:?}", next, self.stage);
    debug!(from = ?self.stage, to = ?next, "stage transition");
    self.stage = next;
    self.history.push(next);
  }

  fn step<T>(&mut self, stage: Stage, f: impl FnOnce(&mut Self) -> ReleaseResult<T>) -> ReleaseResult<T> {
    self.enter(stage);
    let n = self.history.len() - 1;
    println!("Step {}: {}", n, stage.label());
    let value = f(self)?;
    println!("Step {}: Complete", n);
    Ok(value)
  }

  /// Checks that must pass before anything is tagged or written
  fn preflight(&self) -> ReleaseResult<()> {
    let working_dir = normalize_path(&self.ctx.working_dir);
    if working_dir.exists() {
      return Err(ReleaseError::with_help(
        format!("Working directory {} already exists", working_dir.display()),
        "Remove it or release under a different version.",
      ));
    }

    if self.ctx.is_dry_run() {
      let origin = normalize_path(&self.ctx.origin_dir);
      if working_dir.starts_with(&origin) {
        return Err(ReleaseError::with_help(
          format!(
            "Working directory {} lies inside {}, which is copied in dry-run mode",
            working_dir.display(),
            origin.display()
          ),
          "Point release.local_tags_dir outside the project tree.",
        ));
      }
    }
    Ok(())
  }

  fn tag(&mut self) -> ReleaseResult<()> {
    let tag_url = self.config.tag_url(self.ctx.version.as_str());
    if self.ctx.is_dry_run() {
      info!(tag = %tag_url, "dry run, not tagging");
      return Ok(());
    }
    println!("   {} -> {}", self.config.trunk_url(), tag_url);
    self
      .scm
      .tag(&self.config.trunk_url(), &tag_url, self.ctx.version.as_str())
  }

  fn checkout(&mut self) -> ReleaseResult<()> {
    if self.ctx.is_dry_run() {
      let copied = copy_tree(&self.ctx.origin_dir, &self.ctx.working_dir, &[])?;
      info!(files = copied, from = %self.ctx.origin_dir.display(), "dry run, copied working tree");
      return Ok(());
    }
    let tag_url = self.config.tag_url(self.ctx.version.as_str());
    self.scm.checkout(&tag_url, &self.ctx.working_dir)
  }

  fn discover(&mut self) -> ReleaseResult<ModuleSet> {
    let modules = descriptor::discover(&self.ctx.working_dir, &self.config.project.descriptor)?;
    println!("   Found {} descriptor(s) from {}", modules.len(), modules.root().display());
    Ok(modules)
  }

  /// Patch every descriptor; returns how many had version fields
  fn patch(&mut self, modules: &ModuleSet) -> ReleaseResult<usize> {
    let mut bar = FileProgress::for_terminal(modules.len(), "Patching descriptors");
    let mut changed = 0;

    for path in modules {
      let result = descriptor::patch_file(path, &self.ctx.version)?;
      debug!(path = %path.display(), fields = ?result.fields, "patched");
      if result.changed {
        changed += 1;
      }
      if let Some(bar) = bar.as_mut() {
        bar.inc();
      }
    }

    println!("   Set version {} in {} descriptor(s)", self.ctx.version, changed);
    Ok(changed)
  }

  fn stamp(&mut self, modules: &ModuleSet) -> ReleaseResult<()> {
    let source = self.ctx.working_dir.join(&self.config.project.version_source);
    let stamped = stamp::stamp(&source, &self.ctx.version)?;
    println!(
      "   {} (lines {} and {})",
      self.config.project.version_source.display(),
      stamped.bytes_line,
      stamped.string_line
    );
    verify_consistency(modules, &source, &self.ctx)
  }

  fn commit(&mut self) -> ReleaseResult<()> {
    if self.ctx.is_dry_run() {
      info!("dry run, not committing");
      return Ok(());
    }
    let message = format!("{} Release Script: Updated version numbers", display_name(&self.config.project.name));
    self.scm.checkin(&self.ctx.working_dir, &message)
  }

  fn publish(&mut self) -> ReleaseResult<TaskScheduler> {
    let plan = Arc::new(PublishPlan::new(&self.ctx, &self.config));
    publish::unpack_distribution(&plan)?;

    let mut scheduler = TaskScheduler::new();
    for task in publish::tasks(plan, Arc::clone(&self.transfer), self.ctx.concurrency) {
      println!("   {}", task.name());
      if let Err(e) = scheduler.schedule(task) {
        // Workers already started must still be observed
        return Err(scheduler.join_after(e));
      }
    }
    Ok(scheduler)
  }
}

/// Re-read every patched file and check it carries the release version
fn verify_consistency(modules: &ModuleSet, version_source: &Path, ctx: &ReleaseContext) -> ReleaseResult<()> {
  let expected = ctx.version.as_str();

  modules.paths().par_iter().try_for_each(|path| {
    let descriptor = ModuleDescriptor::load(path)?;
    for (_, found) in descriptor.version_fields() {
      if found.trim() != expected {
        return Err(ReleaseError::Inconsistent {
          path: path.clone(),
          found: found.clone(),
          expected: expected.to_string(),
        });
      }
    }
    Ok(())
  })?;

  let stamped = stamp::read_stamped(version_source)?;
  if stamped.version != expected {
    return Err(ReleaseError::Inconsistent {
      path: version_source.to_path_buf(),
      found: stamped.version,
      expected: expected.to_string(),
    });
  }
  let literal = ctx.version.identity_literal();
  if stamped.identity_literal != literal {
    return Err(ReleaseError::Inconsistent {
      path: version_source.to_path_buf(),
      found: stamped.identity_literal,
      expected: literal,
    });
  }

  debug!(descriptors = modules.len(), "all files agree on {}", expected);
  Ok(())
}

/// `infinispan` -> `Infinispan`
fn display_name(name: &str) -> String {
  let mut chars = name.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::context::{Concurrency, ExecutionMode};
  use crate::core::error::TaskFailureKind;
  use crate::core::version::{DEFAULT_VERSION_PATTERN, Version};
  use std::fs::{self, File};
  use std::io::Write;
  use std::sync::Mutex;

  const VERSION_JAVA: &str = "package org.infinispan;\n\npublic class Version {\n   public static final String version = \"4.0.0.SNAPSHOT\";\n   static final byte[] version_id = {'4', '0', '0', 'S'};\n}\n";

  type Log = Arc<Mutex<Vec<String>>>;

  struct MockScm {
    log: Log,
    /// Tree materialized by checkout
    source: PathBuf,
  }

  impl Scm for MockScm {
    fn tag(&self, source_ref: &str, dest_ref: &str, _version_label: &str) -> ReleaseResult<()> {
      self.log.lock().unwrap().push(format!("tag {} {}", source_ref, dest_ref));
      Ok(())
    }

    fn checkout(&self, reference: &str, dest_dir: &Path) -> ReleaseResult<()> {
      self.log.lock().unwrap().push(format!("checkout {}", reference));
      copy_tree(&self.source, dest_dir, &[]).map(|_| ())
    }

    fn checkin(&self, _dir: &Path, message: &str) -> ReleaseResult<()> {
      self.log.lock().unwrap().push(format!("checkin {}", message));
      Ok(())
    }
  }

  struct MockBuilder {
    log: Log,
    fail: bool,
    /// Write a distribution archive for this base name
    archive: Option<String>,
  }

  impl Builder for MockBuilder {
    fn build_and_verify(&self, working_dir: &Path) -> ReleaseResult<()> {
      self.log.lock().unwrap().push("build".to_string());
      if self.fail {
        return Err(ReleaseError::BuildFailed {
          command: "mvn clean install".to_string(),
          status: "exit status: 1".to_string(),
        });
      }
      if let Some(base) = &self.archive {
        let dist = working_dir.join("target/distribution");
        fs::create_dir_all(&dist).unwrap();
        let mut zip = zip::ZipWriter::new(File::create(dist.join(format!("{}-all.zip", base))).unwrap());
        let options = zip::write::FileOptions::default();
        for name in ["doc/apidocs/index.html", "etc/schema/config.xsd"] {
          zip.start_file(format!("{}/{}", base, name), options).unwrap();
          zip.write_all(b"x").unwrap();
        }
        zip.finish().unwrap();
      }
      Ok(())
    }
  }

  struct MockTransfer {
    log: Log,
    fail_sync_to: Option<String>,
  }

  impl Transfer for MockTransfer {
    fn upload(&self, local: &Path, remote: &str) -> ReleaseResult<()> {
      self.log.lock().unwrap().push(format!("upload {} {}", local.display(), remote));
      Ok(())
    }

    fn sync(&self, local: &Path, remote: &str) -> ReleaseResult<()> {
      self.log.lock().unwrap().push(format!("sync {} {}", local.display(), remote));
      if self.fail_sync_to.as_deref() == Some(remote) {
        return Err(ReleaseError::Transfer {
          command: format!("rsync {}", remote),
          status: "exit status: 23".to_string(),
        });
      }
      Ok(())
    }
  }

  fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  }

  /// Two-module project with a version source in `core`
  fn write_project(root: &Path) {
    write(
      &root.join("pom.xml"),
      "<project>\n  <version>4.0.0.SNAPSHOT</version>\n  <modules>\n    <module>core</module>\n    <module>server</module>\n  </modules>\n</project>\n",
    );
    write(
      &root.join("core/pom.xml"),
      "<project>\n  <parent><version>4.0.0.SNAPSHOT</version></parent>\n  <artifactId>core</artifactId>\n</project>\n",
    );
    write(
      &root.join("server/pom.xml"),
      "<project>\n  <parent><version>4.0.0.SNAPSHOT</version></parent>\n  <properties><project-version>4.0.0.SNAPSHOT</project-version></properties>\n</project>\n",
    );
    write(&root.join("tools/readme/pom.xml"), "<project><artifactId>readme</artifactId></project>\n");
    write(&root.join("core/src/main/java/org/infinispan/Version.java"), VERSION_JAVA);
  }

  fn config(dry_run: bool, multi_threaded: bool) -> TagshipConfig {
    TagshipConfig::parse(&format!(
      r#"
[scm]
base = "https://svn.example.org/repos/ispn"
[release]
local_tags_dir = "unused"
dry_run = {}
multi_threaded = {}
[project]
name = "infinispan"
[publish]
docs_target = "docs:/htdocs"
artifacts_target = "frs:/home/frs"
schema_target = "docs:/htdocs/schemas"
"#,
      dry_run, multi_threaded
    ))
    .unwrap()
  }

  struct Fixture {
    _dir: tempfile::TempDir,
    origin: PathBuf,
    working: PathBuf,
    log: Log,
  }

  fn fixture(version: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let origin = dir.path().join("origin");
    write_project(&origin);
    let working = dir.path().join("tags").join(version);
    Fixture {
      _dir: dir,
      origin,
      working,
      log: Arc::new(Mutex::new(Vec::new())),
    }
  }

  fn pipeline(
    fx: &Fixture,
    raw_version: &str,
    mode: ExecutionMode,
    concurrency: Concurrency,
    builder: MockBuilder,
    fail_sync_to: Option<&str>,
  ) -> ReleasePipeline {
    let version = Version::validate(raw_version, DEFAULT_VERSION_PATTERN).unwrap();
    let ctx = ReleaseContext::new(version, fx.working.clone(), fx.origin.clone(), mode, concurrency);
    ReleasePipeline::new(
      ctx,
      config(mode == ExecutionMode::DryRun, concurrency == Concurrency::Background),
      Box::new(MockScm {
        log: Arc::clone(&fx.log),
        source: fx.origin.clone(),
      }),
      Box::new(builder),
      Arc::new(MockTransfer {
        log: Arc::clone(&fx.log),
        fail_sync_to: fail_sync_to.map(str::to_string),
      }),
    )
  }

  fn builder(fx: &Fixture, fail: bool, archive: Option<&str>) -> MockBuilder {
    MockBuilder {
      log: Arc::clone(&fx.log),
      fail,
      archive: archive.map(str::to_string),
    }
  }

  #[test]
  fn test_dry_run_end_to_end() {
    let fx = fixture("9.9.9.FINAL");
    let mut p = pipeline(
      &fx,
      "9.9.9.final",
      ExecutionMode::DryRun,
      Concurrency::Background,
      builder(&fx, false, None),
      None,
    );

    let report = p.run().unwrap();
    assert_eq!(p.stage(), Stage::Done);
    assert_eq!(
      report.history,
      vec![
        Stage::Start,
        Stage::Tag,
        Stage::Checkout,
        Stage::Discover,
        Stage::Patch,
        Stage::Stamp,
        Stage::Commit,
        Stage::Build,
        Stage::Publish,
        Stage::Join,
        Stage::Done
      ]
    );
    assert_eq!(report.descriptors, 4);
    assert_eq!(report.descriptors_changed, 3);
    assert_eq!(report.published.len(), 3);

    for pom in ["pom.xml", "core/pom.xml", "server/pom.xml"] {
      let content = fs::read_to_string(fx.working.join(pom)).unwrap();
      assert!(content.contains("9.9.9.FINAL"), "{pom}");
      assert!(!content.contains("SNAPSHOT"), "{pom}");
    }
    let stamped = fs::read_to_string(fx.working.join("core/src/main/java/org/infinispan/Version.java")).unwrap();
    assert!(stamped.contains("version = \"9.9.9.FINAL\";"));
    assert!(stamped.contains("{'9', '9', '9', 'F', 'I', 'N', 'A', 'L'}"));

    // The origin tree is never modified and nothing external is called
    assert!(fs::read_to_string(fx.origin.join("pom.xml")).unwrap().contains("4.0.0.SNAPSHOT"));
    assert_eq!(*fx.log.lock().unwrap(), vec!["build"]);
  }

  #[test]
  fn test_build_failure_stops_before_publish() {
    let fx = fixture("1.0.0");
    let mut p = pipeline(
      &fx,
      "1.0.0",
      ExecutionMode::DryRun,
      Concurrency::Background,
      builder(&fx, true, None),
      None,
    );

    let err = p.run().unwrap_err();
    assert!(matches!(err, ReleaseError::BuildFailed { .. }));
    assert_eq!(p.stage(), Stage::Failed);
    assert!(!p.history().contains(&Stage::Publish));
    assert_eq!(*p.history().last().unwrap(), Stage::Failed);
  }

  #[test]
  fn test_real_mode_talks_to_scm_and_publishes() {
    let fx = fixture("4.1.1");
    let mut p = pipeline(
      &fx,
      "4.1.1",
      ExecutionMode::Real,
      Concurrency::Inline,
      builder(&fx, false, Some("infinispan-4.1.1")),
      None,
    );

    let report = p.run().unwrap();
    assert_eq!(report.published, vec!["docs", "artifacts", "schema"]);

    let log = fx.log.lock().unwrap();
    assert_eq!(
      log[0],
      "tag https://svn.example.org/repos/ispn/trunk https://svn.example.org/repos/ispn/tags/4.1.1"
    );
    assert_eq!(log[1], "checkout https://svn.example.org/repos/ispn/tags/4.1.1");
    assert_eq!(log[2], "checkin Infinispan Release Script: Updated version numbers");
    assert_eq!(log[3], "build");
    assert!(log[4].starts_with("sync ") && log[4].ends_with("4.1 docs:/htdocs"));
    assert!(log[5].starts_with("upload ") && log[5].ends_with(" frs:/home/frs"));
    assert!(log[6].ends_with("docs:/htdocs/schemas"));
    assert!(fx.working.join("target/distribution/infinispan-4.1.1/doc/4.1/apidocs").is_dir());
  }

  #[test]
  fn test_publish_failure_joins_all_tasks() {
    let fx = fixture("4.1.1");
    let mut p = pipeline(
      &fx,
      "4.1.1",
      ExecutionMode::Real,
      Concurrency::Background,
      builder(&fx, false, Some("infinispan-4.1.1")),
      Some("docs:/htdocs"),
    );

    let err = p.run().unwrap_err();
    assert_eq!(p.stage(), Stage::Failed);
    assert!(p.history().contains(&Stage::Join));
    match err {
      ReleaseError::Publish(failures) => {
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task, "docs");
        assert!(matches!(failures[0].kind, TaskFailureKind::Failed(_)));
      }
      other => panic!("expected publish failure, got {other}"),
    }

    let log = fx.log.lock().unwrap();
    assert!(log.iter().any(|l| l.starts_with("upload ")));
    assert!(log.iter().any(|l| l.ends_with("docs:/htdocs/schemas")));
  }

  #[test]
  fn test_inline_publish_failure_stops_at_publish() {
    let fx = fixture("4.1.1");
    let mut p = pipeline(
      &fx,
      "4.1.1",
      ExecutionMode::Real,
      Concurrency::Inline,
      builder(&fx, false, Some("infinispan-4.1.1")),
      Some("docs:/htdocs"),
    );

    let err = p.run().unwrap_err();
    assert!(!p.history().contains(&Stage::Join));
    match err {
      ReleaseError::Publish(failures) => {
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task, "docs");
      }
      other => panic!("expected publish failure, got {other}"),
    }
    assert!(!fx.log.lock().unwrap().iter().any(|l| l.starts_with("upload ")));
  }

  #[test]
  fn test_existing_working_dir_rejected_before_tagging() {
    let fx = fixture("1.0.0");
    fs::create_dir_all(&fx.working).unwrap();
    let mut p = pipeline(
      &fx,
      "1.0.0",
      ExecutionMode::Real,
      Concurrency::Inline,
      builder(&fx, false, None),
      None,
    );

    assert!(p.run().is_err());
    assert_eq!(p.history(), [Stage::Start, Stage::Failed]);
    assert!(fx.log.lock().unwrap().is_empty());
  }

  #[test]
  fn test_dry_run_working_dir_inside_origin_rejected() {
    let mut fx = fixture("1.0.0");
    fx.working = fx.origin.join("tags/1.0.0");
    let mut p = pipeline(
      &fx,
      "1.0.0",
      ExecutionMode::DryRun,
      Concurrency::Inline,
      builder(&fx, false, None),
      None,
    );

    let err = p.run().unwrap_err();
    assert!(err.to_string().contains("lies inside"));
    assert!(!fx.working.exists());
  }

  #[test]
  fn test_missing_version_source_fails_at_stamp() {
    let fx = fixture("1.0.0");
    fs::remove_file(fx.origin.join("core/src/main/java/org/infinispan/Version.java")).unwrap();
    let mut p = pipeline(
      &fx,
      "1.0.0",
      ExecutionMode::DryRun,
      Concurrency::Inline,
      builder(&fx, false, None),
      None,
    );

    let err = p.run().unwrap_err();
    assert!(matches!(err, ReleaseError::MissingStampTarget { .. }));
    assert_eq!(p.history()[p.history().len() - 2], Stage::Stamp);
  }

  #[test]
  fn test_display_name() {
    assert_eq!(display_name("infinispan"), "Infinispan");
    assert_eq!(display_name(""), "");
  }
}
