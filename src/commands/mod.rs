//! CLI commands for tagship
//!
//! - **release**: tag, stamp, build and publish one version

pub mod release;

pub use release::{print_usage, run_release};
