//! Conversion of `const-class` comparison chains into table-driven switches.
//!
//! Methods that pick a path by comparing one value against many class literals,
//!
//! ```java
//! if (kind == A.class) { ... }
//! else if (kind == B.class) { ... }
//! else if (kind == C.class) { ... }
//! ...
//! else { ... }
//! ```
//!
//! are rewritten to look the class name up in a compact string table and `switch` on the
//! resulting ordinal. Every rewrite adds a table getter method to the class, so the number of
//! rewrites per container is capped and the references they need are reserved up front.
//!
//! # Phases
//!
//! 1. **Scan** ([`should_consider_method`]) and **match** ([`DecisionTreeMatcher`]) run in
//!    parallel over all methods, producing one [`TransformPlan`] per method with accepted
//!    [`DecisionTree`]s.
//! 2. Per container, in container order, the [`BudgetScheduler`] admits plans and the
//!    [`CodeSynthesizer`] commits them one at a time.

mod config;
mod matcher;
mod scanner;
mod scheduler;
mod synthesis;

pub use config::ConstClassBranchesConfig;
pub use matcher::{order_blocks, DecisionTree, DecisionTreeMatcher, TransformPlan};
pub use scanner::should_consider_method;
pub use scheduler::{Admission, BudgetScheduler};
pub use synthesis::{
    assign_ordinals, build_helper, encode_table, helper_ref, CodeSynthesizer, CommitStats,
    HELPER_BASE_NAME, HELPER_ERROR_MESSAGE, MAX_HELPER_DEPTH,
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    compiler::{PassContext, ProgramPass},
    metadata::{
        DexMethod, MethodRef, Program, ReservationGuard, ReserveRefsInfo, ReservedRefsHandle,
    },
    Result,
};

/// Counter: methods whose code was replaced.
pub const METRIC_METHODS_TRANSFORMED: &str = "num_methods_transformed";
/// Counter: `const-class` instructions removed.
pub const METRIC_CONST_CLASS_REMOVED: &str = "num_const_class_instructions_removed";
/// Counter: characters of encoded table data emitted.
pub const METRIC_TOTAL_STRING_SIZE: &str = "total_string_size";

/// The const-class branch transformation pass.
pub struct ConstClassBranchesPass {
    config: ConstClassBranchesConfig,
    lookup: Option<MethodRef>,
    reservation: Option<ReservedRefsHandle>,
}

impl ConstClassBranchesPass {
    /// Creates the pass.
    #[must_use]
    pub fn new(config: ConstClassBranchesConfig) -> Self {
        ConstClassBranchesPass {
            config,
            lookup: None,
            reservation: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConstClassBranchesConfig {
        &self.config
    }

    /// References the pass may add to one container: the `Class` type, the lookup routine,
    /// and one getter per rewrite.
    #[must_use]
    pub fn reservation_size(&self) -> ReserveRefsInfo {
        ReserveRefsInfo::new(1, 0, 1 + self.config.transforms_per_container)
    }

    fn transform(
        &self,
        program: &mut Program,
        ctx: &PassContext,
        lookup: &MethodRef,
    ) -> Result<()> {
        let plans = boxcar::Vec::new();
        {
            let methods: Vec<&DexMethod> = program.methods().collect();
            let matcher = DecisionTreeMatcher::new(&self.config, program);
            let candidates = methods
                .par_iter()
                .filter(|method| should_consider_method(method, self.config.min_cases))
                .map(|method| {
                    if let Some(plan) = matcher.match_method(method) {
                        plans.push(plan);
                    }
                })
                .count();
            debug!(
                "{} candidate method(s) out of {}, {} plan(s)",
                candidates,
                methods.len(),
                plans.count()
            );
        }

        let mut by_container: Vec<Vec<TransformPlan>> =
            program.containers().iter().map(|_| Vec::new()).collect();
        for plan in plans {
            let container = program
                .container_of(&plan.method.class)
                .ok_or_else(|| invariant_error!("{} is not in any container", plan.method))?;
            by_container[container].push(plan);
        }

        let scheduler = BudgetScheduler::new(self.config.transforms_per_container);
        let synthesizer = CodeSynthesizer::new(lookup);
        let mut total = CommitStats::default();
        let mut methods = 0;
        for (container, plans) in by_container.into_iter().enumerate() {
            if plans.is_empty() {
                continue;
            }
            let admission = scheduler.admit(plans);
            debug!(
                "Container {}: committing {} plan(s) with {} tree(s), {} dropped",
                container,
                admission.admitted.len(),
                admission.trees,
                admission.dropped
            );

            let mut transform_index = 0;
            for plan in admission.admitted {
                let stats = synthesizer.commit_plan(program, plan, &mut transform_index)?;
                methods += 1;
                total.trees += stats.trees;
                total.const_class_removed += stats.const_class_removed;
                total.string_size += stats.string_size;
            }
            if transform_index > self.config.transforms_per_container {
                return Err(invariant_error!(
                    "container {} received {} rewrites, cap is {}",
                    container,
                    transform_index,
                    self.config.transforms_per_container
                ));
            }
        }

        let name = self.name();
        ctx.metrics
            .incr(name, METRIC_METHODS_TRANSFORMED, methods as u64);
        ctx.metrics.incr(
            name,
            METRIC_CONST_CLASS_REMOVED,
            total.const_class_removed as u64,
        );
        ctx.metrics
            .incr(name, METRIC_TOTAL_STRING_SIZE, total.string_size as u64);
        info!(
            "[{}] Altered {} method(s) to remove {} const-class instruction(s); {} byte(s) of table data created",
            name, methods, total.const_class_removed, total.string_size
        );
        Ok(())
    }
}

impl ProgramPass for ConstClassBranchesPass {
    fn name(&self) -> &'static str {
        "TransformConstClassBranchesPass"
    }

    fn description(&self) -> &'static str {
        "Rewrites const-class comparison chains into string table lookups"
    }

    fn eval(&mut self, program: &Program, ctx: &PassContext) -> Result<()> {
        if self.reservation.is_some() {
            return Err(invariant_error!("{} evaluated twice", self.name()));
        }
        self.config.validate()?;

        let Some(descriptor) = self.config.lookup_method() else {
            info!("[{}] No lookup method configured, disabled", self.name());
            return Ok(());
        };
        let Some(lookup) = program.resolve_method(descriptor) else {
            info!(
                "[{}] Lookup method {} not found, disabled",
                self.name(),
                descriptor
            );
            return Ok(());
        };

        self.lookup = Some(lookup);
        self.reservation = Some(ctx.reservations.reserve(self.name(), self.reservation_size()));
        Ok(())
    }

    fn run(&mut self, program: &mut Program, ctx: &PassContext) -> Result<()> {
        let Some(lookup) = self.lookup.take() else {
            return Ok(());
        };
        let handle = self
            .reservation
            .take()
            .ok_or_else(|| invariant_error!("reservation handle missing for {}", self.name()))?;

        let guard = ReservationGuard::new(&ctx.reservations, handle);
        let result = self.transform(program, ctx, &lookup);
        let released = guard.release();
        result?;
        released.map(|_| ())
    }

    fn abort(&mut self, ctx: &PassContext) {
        self.lookup = None;
        if let Some(handle) = self.reservation.take() {
            if let Err(e) = ctx.reservations.release(handle) {
                warn!("[{}] Failed to release reservation: {e}", self.name());
            }
        }
    }
}
