//! Admission of plans against the per-container rewrite cap.
//!
//! Plans of one container are ordered by their method and then consumed from the last to the
//! first. Consumption stops at the first plan that would exceed the cap; every plan not yet
//! consumed is dropped, even if a smaller one further down would still fit.

use tracing::debug;

use crate::compiler::passes::constclass::TransformPlan;

/// Greedy admission of plans under a fixed tree budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetScheduler {
    cap: usize,
}

/// Plans admitted for one container, in commit order, and what was left out.
#[derive(Debug, Default)]
pub struct Admission {
    /// Plans to commit, in order.
    pub admitted: Vec<TransformPlan>,
    /// Number of plans dropped because the cap was reached.
    pub dropped: usize,
    /// Total trees of the admitted plans.
    pub trees: usize,
}

impl BudgetScheduler {
    /// Creates a scheduler admitting at most `cap` trees per container.
    #[must_use]
    pub const fn new(cap: usize) -> Self {
        BudgetScheduler { cap }
    }

    /// Returns the per-container cap.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Selects the plans of one container to commit.
    #[must_use]
    pub fn admit(&self, mut plans: Vec<TransformPlan>) -> Admission {
        plans.sort_by(|a, b| a.method.cmp(&b.method));

        let mut admission = Admission::default();
        let mut remaining = plans.into_iter().rev();
        while let Some(plan) = remaining.next() {
            let trees = plan.trees.len();
            if admission.trees + trees > self.cap {
                admission.dropped = 1 + remaining.count();
                debug!(
                    "Rewrite cap of {} reached at {}, dropping {} plan(s)",
                    self.cap, plan.method, admission.dropped
                );
                break;
            }
            admission.trees += trees;
            admission.admitted.push(plan);
        }
        admission
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::{
        analysis::{BlockId, ControlFlowGraph},
        compiler::passes::constclass::DecisionTree,
        test::helpers::method_ref,
    };

    fn plan(name: &str, trees: usize) -> TransformPlan {
        let tree = DecisionTree {
            root: BlockId::new(0),
            discriminant: 0,
            cases: BTreeMap::new(),
            default: BlockId::new(1),
            visited: BTreeSet::new(),
        };
        TransformPlan {
            method: method_ref("com/example/Host", name),
            code: ControlFlowGraph::new(1),
            trees: vec![tree; trees],
        }
    }

    fn names(admission: &Admission) -> Vec<String> {
        admission
            .admitted
            .iter()
            .map(|plan| plan.method.name.to_string())
            .collect()
    }

    #[test]
    fn test_reverse_order_admission() {
        let plans = vec![plan("c", 1), plan("a", 1), plan("d", 1), plan("b", 1)];
        let admission = BudgetScheduler::new(3).admit(plans);
        assert_eq!(names(&admission), vec!["d", "c", "b"]);
        assert_eq!(admission.dropped, 1);
        assert_eq!(admission.trees, 3);
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // "c" does not fit after "d"; the smaller "a" and "b" are dropped as well.
        let plans = vec![plan("a", 1), plan("b", 1), plan("c", 3), plan("d", 2)];
        let admission = BudgetScheduler::new(4).admit(plans);
        assert_eq!(names(&admission), vec!["d"]);
        assert_eq!(admission.dropped, 3);
    }

    #[test]
    fn test_everything_fits() {
        let plans = vec![plan("a", 2), plan("b", 3)];
        let admission = BudgetScheduler::new(5).admit(plans);
        assert_eq!(admission.admitted.len(), 2);
        assert_eq!(admission.dropped, 0);
    }

    #[test]
    fn test_zero_cap() {
        let admission = BudgetScheduler::new(0).admit(vec![plan("a", 1)]);
        assert!(admission.admitted.is_empty());
        assert_eq!(admission.dropped, 1);
        assert_eq!(BudgetScheduler::new(0).cap(), 0);
    }
}
