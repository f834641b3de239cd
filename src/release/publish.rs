//! Publishing jobs for a built release
//!
//! Three independent jobs push the build output to their destinations:
//! API docs (rsync), distribution artifacts (scp) and configuration schemas
//! (rsync). Each job owns disjoint local paths and talks to its own remote
//! target, so they can run on separate workers. The distribution archive is
//! unpacked once, before any job starts, since docs and schema both read
//! from the unpacked tree.

use crate::core::config::TagshipConfig;
use crate::core::context::{Concurrency, ReleaseContext};
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::core::transfer::Transfer;
use crate::core::version::Version;
use crate::release::scheduler::Task;
use crate::utils::copy_tree;
use glob::Pattern;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{info, warn};

/// Distribution entries not uploaded with the artifacts
pub const ARTIFACT_IGNORE: &[&str] = &["*.xml", "*.sha1", "*.md5", "*.pom", ".svn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishJob {
  Docs,
  Artifacts,
  Schema,
}

impl PublishJob {
  pub const ALL: [PublishJob; 3] = [PublishJob::Docs, PublishJob::Artifacts, PublishJob::Schema];

  pub fn name(self) -> &'static str {
    match self {
      PublishJob::Docs => "docs",
      PublishJob::Artifacts => "artifacts",
      PublishJob::Schema => "schema",
    }
  }
}

/// Everything the publishing jobs need, resolved up front
#[derive(Debug, Clone)]
pub struct PublishPlan {
  pub version: Version,
  pub distribution_dir: PathBuf,
  /// `<distribution>/<name>-<version>`, created by unpacking the archive
  pub unpacked_dir: PathBuf,
  pub archive: PathBuf,
  /// `<origin>/.tmp/<version>`
  pub staging_dir: PathBuf,
  pub docs_target: String,
  pub artifacts_target: String,
  pub schema_target: String,
  /// Absolute path of the docs hook, if configured
  pub docs_hook: Option<PathBuf>,
  pub dry_run: bool,
}

impl PublishPlan {
  pub fn new(ctx: &ReleaseContext, config: &TagshipConfig) -> Self {
    let distribution_dir = ctx.distribution_dir();
    let base_name = format!("{}-{}", config.project.name, ctx.version);

    Self {
      version: ctx.version.clone(),
      unpacked_dir: distribution_dir.join(&base_name),
      archive: distribution_dir.join(format!("{}-all.zip", base_name)),
      distribution_dir,
      staging_dir: ctx.origin_dir.join(".tmp").join(ctx.version.as_str()),
      docs_target: config.publish.docs_target.clone().unwrap_or_default(),
      artifacts_target: config.publish.artifacts_target.clone().unwrap_or_default(),
      schema_target: config.publish.schema_target.clone().unwrap_or_default(),
      docs_hook: config.publish.docs_hook.as_ref().map(|hook| ctx.working_dir.join(hook)),
      dry_run: ctx.is_dry_run(),
    }
  }

  fn doc_dir(&self) -> PathBuf {
    self.unpacked_dir.join("doc")
  }

  /// Trailing `.` so rsync mirrors the directory contents, not the directory
  fn schema_dir(&self) -> PathBuf {
    self.unpacked_dir.join("etc").join("schema").join(".")
  }
}

/// Extract the `-all.zip` distribution archive next to itself.
///
/// Skipped in dry-run, where nothing is built for publishing.
pub fn unpack_distribution(plan: &PublishPlan) -> ReleaseResult<()> {
  if plan.dry_run {
    info!(archive = %plan.archive.display(), "dry run, not unpacking distribution");
    return Ok(());
  }

  let file = File::open(&plan.archive).with_context(|| format!("Failed to open {}", plan.archive.display()))?;
  let mut archive = zip::ZipArchive::new(file)?;
  info!(archive = %plan.archive.display(), entries = archive.len(), "unpacking distribution");
  archive.extract(&plan.distribution_dir)?;

  if !plan.unpacked_dir.is_dir() {
    return Err(ReleaseError::with_help(
      format!("Archive {} did not contain {}", plan.archive.display(), plan.unpacked_dir.display()),
      "The distribution profile must produce <name>-<version>/ inside the -all.zip archive.",
    ));
  }
  Ok(())
}

/// Build one scheduler task per publishing job
pub fn tasks(plan: Arc<PublishPlan>, transfer: Arc<dyn Transfer>, mode: Concurrency) -> Vec<Task> {
  PublishJob::ALL
    .iter()
    .map(|&job| {
      let plan = Arc::clone(&plan);
      let transfer = Arc::clone(&transfer);
      Task::new(job.name(), mode, move || run_job(job, &plan, transfer.as_ref()))
    })
    .collect()
}

pub fn run_job(job: PublishJob, plan: &PublishPlan, transfer: &dyn Transfer) -> ReleaseResult<()> {
  match job {
    PublishJob::Docs => publish_docs(plan, transfer),
    PublishJob::Artifacts => publish_artifacts(plan, transfer),
    PublishJob::Schema => publish_schema(plan, transfer),
  }
}

/// Run the docs hook, move `apidocs` under `<major.minor>/apidocs` and sync
/// that directory to the docs target.
fn publish_docs(plan: &PublishPlan, transfer: &dyn Transfer) -> ReleaseResult<()> {
  let doc_dir = plan.doc_dir();
  let short_dir = doc_dir.join(plan.version.short());

  if plan.dry_run {
    info!(
      local = %short_dir.display(),
      remote = %plan.docs_target,
      "dry run, would sync API docs"
    );
    return Ok(());
  }

  if let Some(hook) = &plan.docs_hook {
    run_docs_hook(hook, &doc_dir)?;
  }

  fs::create_dir_all(&short_dir).with_context(|| format!("Failed to create {}", short_dir.display()))?;
  let apidocs = doc_dir.join("apidocs");
  let moved = short_dir.join("apidocs");
  fs::rename(&apidocs, &moved).with_context(|| {
    format!("Failed to move {} to {}", apidocs.display(), moved.display())
  })?;

  transfer.sync(&short_dir, &plan.docs_target)
}

fn run_docs_hook(hook: &Path, doc_dir: &Path) -> ReleaseResult<()> {
  info!(hook = %hook.display(), dir = %doc_dir.display(), "running docs hook");
  let status = Command::new(hook)
    .current_dir(doc_dir)
    .status()
    .with_context(|| format!("Failed to start docs hook {}", hook.display()))?;

  if !status.success() {
    return Err(ReleaseError::message(format!(
      "Docs hook {} failed ({})",
      hook.display(),
      status
    )));
  }
  Ok(())
}

/// Stage the distribution without checksums and descriptors, upload it,
/// then drop the staging copy.
fn publish_artifacts(plan: &PublishPlan, transfer: &dyn Transfer) -> ReleaseResult<()> {
  if plan.dry_run {
    info!(
      local = %plan.distribution_dir.display(),
      remote = %plan.artifacts_target,
      "dry run, would upload artifacts"
    );
    return Ok(());
  }

  let mut ignore = ARTIFACT_IGNORE
    .iter()
    .map(|p| Pattern::new(p))
    .collect::<Result<Vec<_>, _>>()?;
  // The unpacked tree belongs to the docs and schema jobs
  if let Some(name) = plan.unpacked_dir.file_name() {
    ignore.push(Pattern::new(&Pattern::escape(&name.to_string_lossy()))?);
  }

  if plan.staging_dir.exists() {
    fs::remove_dir_all(&plan.staging_dir)
      .with_context(|| format!("Failed to clear stale staging {}", plan.staging_dir.display()))?;
  }
  let copied = copy_tree(&plan.distribution_dir, &plan.staging_dir, &ignore)?;
  info!(files = copied, staging = %plan.staging_dir.display(), "staged artifacts");

  let uploaded = transfer.upload(&plan.staging_dir, &plan.artifacts_target);
  remove_staging(&plan.staging_dir);
  uploaded
}

fn remove_staging(staging_dir: &Path) {
  if let Err(e) = fs::remove_dir_all(staging_dir) {
    warn!(staging = %staging_dir.display(), error = %e, "could not remove staging directory");
    return;
  }
  // The parent .tmp only goes away once empty
  if let Some(parent) = staging_dir.parent() {
    let _ = fs::remove_dir(parent);
  }
}

fn publish_schema(plan: &PublishPlan, transfer: &dyn Transfer) -> ReleaseResult<()> {
  let schema_dir = plan.schema_dir();
  if plan.dry_run {
    info!(
      local = %schema_dir.display(),
      remote = %plan.schema_target,
      "dry run, would sync schemas"
    );
    return Ok(());
  }
  transfer.sync(&schema_dir, &plan.schema_target)
}
