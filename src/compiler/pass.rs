//! Pass trait for whole-program transformations.

use crate::{compiler::PassContext, metadata::Program, Result};

/// A transformation over the whole program.
///
/// The [`PassManager`](crate::compiler::PassManager) drives passes in two rounds: first
/// [`eval`](ProgramPass::eval) is called on every pass, then [`run`](ProgramPass::run). The
/// eval round is where a pass claims resources that must be known before any pass changes the
/// program, most importantly the references it may add to each container.
pub trait ProgramPass: Send {
    /// Unique name for logging, metrics and reservations.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Inspects the program before any pass runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass is misconfigured.
    fn eval(&mut self, _program: &Program, _ctx: &PassContext) -> Result<()> {
        Ok(())
    }

    /// Transforms the program.
    ///
    /// # Errors
    ///
    /// Returns an error if an internal invariant is violated; such errors abort the whole run.
    fn run(&mut self, program: &mut Program, ctx: &PassContext) -> Result<()>;

    /// Gives back everything claimed in [`eval`](ProgramPass::eval) that [`run`](ProgramPass::run)
    /// did not consume.
    ///
    /// Called on every pass when the manager stops early with an error, including passes
    /// that were never run.
    fn abort(&mut self, _ctx: &PassContext) {}
}
