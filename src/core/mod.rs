//! Core building blocks shared by every release stage
//!
//! - **config**: tagship.toml parsing and pre-flight validation
//! - **context**: the immutable per-run release context
//! - **error**: error types with contextual help and exit codes
//! - **version**: release version validation and derived forms
//! - **vcs**: source control abstraction (SystemSvn)
//! - **builder**: build/verification collaborator
//! - **transfer**: scp/rsync file transfer collaborator

pub mod builder;
pub mod config;
pub mod context;
pub mod error;
pub mod transfer;
pub mod vcs;
pub mod version;
