//! Optimization passes.
//!
//! - [`constclass`] - Rewrites `const-class` comparison chains into string table switches

pub mod constclass;

pub use constclass::{ConstClassBranchesConfig, ConstClassBranchesPass};
