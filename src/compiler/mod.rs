//! Whole-program pass infrastructure and the optimization passes built on it.
//!
//! - [`ProgramPass`] - The trait every pass implements
//! - [`PassManager`] / [`PassContext`] - Two-round (eval, then run) pass execution with shared
//!   reservations and metrics
//! - [`Metrics`] - Monotonic per-pass counters
//! - [`passes`] - The passes themselves

mod manager;
mod metrics;
mod pass;
pub mod passes;

pub use manager::{PassContext, PassManager};
pub use metrics::Metrics;
pub use pass::ProgramPass;
pub use passes::{ConstClassBranchesConfig, ConstClassBranchesPass};
