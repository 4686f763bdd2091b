//! Runs a sequence of [`ProgramPass`]es over a program.

use tracing::{debug, info, warn};

use crate::{
    compiler::{Metrics, ProgramPass},
    metadata::{Program, RefReservations},
    Result,
};

/// State shared by all passes of one run.
#[derive(Debug, Default)]
pub struct PassContext {
    /// Reference budget reservations held by passes.
    pub reservations: RefReservations,
    /// Counters reported by passes.
    pub metrics: Metrics,
}

impl PassContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Ordered list of passes.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn ProgramPass>>,
}

impl PassManager {
    /// Creates a manager without passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pass.
    pub fn add(&mut self, pass: Box<dyn ProgramPass>) {
        self.passes.push(pass);
    }

    /// Appends a pass, builder style.
    #[must_use]
    pub fn with_pass(mut self, pass: Box<dyn ProgramPass>) -> Self {
        self.add(pass);
        self
    }

    /// Returns the number of registered passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if no pass is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Evaluates every pass, then runs every pass, in registration order.
    ///
    /// If any step fails, every pass is aborted so that reservations taken during evaluation
    /// are released before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass, or an invariant error if any pass left a
    /// reference reservation outstanding after the run.
    pub fn run_passes(&mut self, program: &mut Program, ctx: &PassContext) -> Result<()> {
        let result = self.drive(program, ctx);
        if let Err(e) = &result {
            warn!("Pass run failed, aborting {} pass(es): {e}", self.passes.len());
            for pass in &mut self.passes {
                pass.abort(ctx);
            }
        }
        result
    }

    fn drive(&mut self, program: &mut Program, ctx: &PassContext) -> Result<()> {
        for pass in &mut self.passes {
            debug!("Evaluating pass {}", pass.name());
            pass.eval(program, ctx)?;
        }

        for pass in &mut self.passes {
            info!("Running pass {}: {}", pass.name(), pass.description());
            pass.run(program, ctx)?;
        }

        let outstanding = ctx.reservations.outstanding();
        if !outstanding.is_empty() {
            return Err(invariant_error!(
                "reference reservations leaked by: {}",
                outstanding.join(", ")
            ));
        }
        Ok(())
    }
}
