//! Release orchestration
//!
//! - **pipeline**: the staged release state machine
//! - **publish**: docs, artifacts and schema publishing jobs
//! - **scheduler**: inline or background execution of publishing jobs, with
//!   a join barrier that reports every failure

pub mod pipeline;
pub mod publish;
pub mod scheduler;

pub use pipeline::{ReleasePipeline, ReleaseReport};
