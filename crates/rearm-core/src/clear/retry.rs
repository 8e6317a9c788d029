//! Retry accountant.
//!
//! Computes the retry budget (`max_tries`) a task instance gets when it is
//! cleared. Resolution is per task instance: one batch can mix instances
//! whose task still exists with instances whose task was removed from the
//! workflow since the run started.
//!
//! - Task found in its definition: `try_number + retries`.
//! - No definition, or task missing from it: `max(try_number, max_tries)`,
//!   i.e. no new retries, but nothing already granted is taken away.
//!
//! Either way the budget never drops below the previous `max_tries`.

use rearm_types::definition::WorkflowDefinition;
use rearm_types::task::TaskInstance;

/// Where the new budget came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetSource {
    /// The task's definition granted `retries` more attempts.
    Definition { retries: u32 },
    /// A definition was found but no longer contains the task.
    TaskMissing,
    /// No definition could be resolved for the task's workflow.
    NoDefinition,
}

impl BudgetSource {
    /// Resolve the source for `task_id` against an optional definition.
    pub fn resolve(definition: Option<&WorkflowDefinition>, task_id: &str) -> Self {
        match definition {
            None => BudgetSource::NoDefinition,
            Some(def) => match def.task_retries(task_id) {
                Some(retries) => BudgetSource::Definition { retries },
                None => BudgetSource::TaskMissing,
            },
        }
    }

    /// Whether the budget fell back to what the instance already had.
    pub fn is_fallback(self) -> bool {
        !matches!(self, BudgetSource::Definition { .. })
    }
}

/// A computed retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_tries: u32,
    pub source: BudgetSource,
}

/// New `max_tries` for `ti` given where its retries come from.
pub fn compute_max_tries(ti: &TaskInstance, source: BudgetSource) -> u32 {
    let granted = match source {
        BudgetSource::Definition { retries } => ti.try_number.saturating_add(retries),
        BudgetSource::TaskMissing | BudgetSource::NoDefinition => ti.try_number,
    };
    granted.max(ti.max_tries)
}

/// Resolve and compute the budget of `ti` in one step.
pub fn retry_budget(ti: &TaskInstance, definition: Option<&WorkflowDefinition>) -> RetryBudget {
    let source = BudgetSource::resolve(definition, &ti.task_id);
    RetryBudget {
        max_tries: compute_max_tries(ti, source),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rearm_types::run::RunId;

    fn ti(task_id: &str, try_number: u32, max_tries: u32) -> TaskInstance {
        let mut ti = TaskInstance::new(RunId::new(), "etl", task_id, max_tries);
        ti.try_number = try_number;
        ti
    }

    fn etl() -> WorkflowDefinition {
        WorkflowDefinition::new("etl")
            .with_task("extract", 0)
            .with_task("load", 2)
    }

    #[test]
    fn definition_grants_retries_on_top_of_try_number() {
        // attempt 1, two retries configured -> three attempts allowed
        let budget = retry_budget(&ti("load", 1, 2), Some(&etl()));
        assert_eq!(budget.max_tries, 3);
        assert_eq!(budget.source, BudgetSource::Definition { retries: 2 });
    }

    #[test]
    fn zero_retries_allows_exactly_one_more_attempt_slot() {
        let budget = retry_budget(&ti("extract", 1, 0), Some(&etl()));
        assert_eq!(budget.max_tries, 1);
    }

    #[test]
    fn repeated_clears_keep_granting_from_current_try() {
        // After a second attempt the same definition grants from try 2.
        let budget = retry_budget(&ti("extract", 2, 1), Some(&etl()));
        assert_eq!(budget.max_tries, 2);

        let budget = retry_budget(&ti("load", 2, 3), Some(&etl()));
        assert_eq!(budget.max_tries, 4);
    }

    #[test]
    fn task_missing_from_definition_falls_back() {
        let budget = retry_budget(&ti("transform", 1, 2), Some(&etl()));
        assert_eq!(budget.source, BudgetSource::TaskMissing);
        assert_eq!(budget.max_tries, 2);

        let budget = retry_budget(&ti("transform", 1, 0), Some(&etl()));
        assert_eq!(budget.max_tries, 1);
    }

    #[test]
    fn no_definition_falls_back() {
        let budget = retry_budget(&ti("load", 1, 2), None);
        assert_eq!(budget.source, BudgetSource::NoDefinition);
        assert_eq!(budget.max_tries, 2);

        let budget = retry_budget(&ti("load", 3, 2), None);
        assert_eq!(budget.max_tries, 3);
    }

    #[test]
    fn fallback_never_adds_retries() {
        for (try_number, max_tries) in [(0, 0), (1, 0), (1, 5), (4, 2), (7, 7)] {
            let budget = retry_budget(&ti("gone", try_number, max_tries), Some(&etl()));
            assert_eq!(budget.max_tries, try_number.max(max_tries));
        }
    }

    #[test]
    fn budget_never_shrinks_when_retries_were_lowered() {
        // The instance was granted 5 tries earlier; the definition now says 0.
        let budget = retry_budget(&ti("extract", 1, 5), Some(&etl()));
        assert_eq!(budget.max_tries, 5);
    }

    #[test]
    fn budget_is_at_least_try_number() {
        for source in [
            BudgetSource::Definition { retries: 0 },
            BudgetSource::TaskMissing,
            BudgetSource::NoDefinition,
        ] {
            let instance = ti("load", 6, 1);
            assert!(compute_max_tries(&instance, source) >= instance.try_number);
        }
    }

    #[test]
    fn retries_saturate_instead_of_overflowing() {
        let budget = retry_budget(&ti("load", u32::MAX - 1, 0), Some(&etl()));
        assert_eq!(budget.max_tries, u32::MAX);
    }

    #[test]
    fn resolution_is_per_task_within_one_definition() {
        let def = etl();
        assert_eq!(
            BudgetSource::resolve(Some(&def), "load"),
            BudgetSource::Definition { retries: 2 }
        );
        assert_eq!(
            BudgetSource::resolve(Some(&def), "removed"),
            BudgetSource::TaskMissing
        );
        assert!(BudgetSource::resolve(Some(&def), "removed").is_fallback());
        assert!(!BudgetSource::resolve(Some(&def), "load").is_fallback());
    }
}
