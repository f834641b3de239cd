//! Release command implementation
//!
//! Loads configuration before looking at the version argument, so a
//! misconfigured checkout is reported (exit 2) even when no version is given.

use crate::core::builder::CommandBuilder;
use crate::core::config::TagshipConfig;
use crate::core::context::{Concurrency, ReleaseContext};
use crate::core::error::{ReleaseResult, ResultExt};
use crate::core::transfer::SystemTransfer;
use crate::core::vcs::SystemSvn;
use crate::core::version::Version;
use crate::release::{ReleasePipeline, ReleaseReport};
use std::env;
use std::sync::Arc;
use tracing::{debug, error};

const USAGE: &str = "\
Usage:

    $ tagship <version>

E.g.,

    $ tagship 4.1.1.BETA1

Settings are read from tagship.toml in the current directory.";

/// Print the usage banner to stdout
pub fn print_usage() {
  println!();
  println!("{}", USAGE);
}

/// Run a release of `version`, or print usage when it is absent
pub fn run_release(version: Option<String>) -> ReleaseResult<()> {
  let origin_dir = env::current_dir().context("Failed to determine the current directory")?;
  let config = TagshipConfig::load(&origin_dir)?;

  let Some(raw) = version else {
    print_usage();
    return Ok(());
  };
  let version = Version::validate(&raw, &config.release.version_pattern)?;

  let ctx = ReleaseContext::from_config(version, &origin_dir, &config);
  println!("🚀 Releasing {} version {}", config.project.name, ctx.version);
  if ctx.is_dry_run() {
    println!("🔍 Dry-run mode (no tag, commit or uploads)");
  }
  if ctx.concurrency == Concurrency::Background {
    println!("   Publishing tasks run in parallel");
  }
  println!("Please stand by!");
  println!();

  let builder = CommandBuilder::new(config.build.command.clone());
  let mut pipeline = ReleasePipeline::new(
    ctx,
    config,
    Box::new(SystemSvn::new()),
    Box::new(builder),
    Arc::new(SystemTransfer::new()),
  );
  let report = match pipeline.run() {
    Ok(report) => report,
    Err(e) => {
      error!(stage = ?pipeline.stage(), history = ?pipeline.history(), "release stopped");
      return Err(e);
    }
  };
  debug!(history = ?report.history, "release finished");

  print_completion(&report, pipeline.context().is_dry_run());
  Ok(())
}

fn print_completion(report: &ReleaseReport, dry_run: bool) {
  println!();
  println!(
    "✅ Release {} completed in {}s ({})",
    report.version,
    report.elapsed().as_secs(),
    report.finished_at.format("%Y-%m-%d %H:%M:%S")
  );
  println!(
    "   {} descriptor(s), {} updated; published: {}",
    report.descriptors,
    report.descriptors_changed,
    report.published.join(", ")
  );
  println!("   Working copy: {}", report.working_dir.display());
  println!();

  if dry_run {
    println!("Dry run complete. Nothing was tagged, committed or uploaded.");
    return;
  }

  println!("Next steps:");
  println!("  1. Release the version in the issue tracker");
  println!("  2. Announce the release and update the download pages");
  println!("  3. Bump trunk to the next development version");
}
