//! Budget Tracker (C3)
//!
//! Pure in-workflow accounting of cumulative LLM cost against a limit. Never
//! touches the database or the clock; mutated only by workflow code, matching
//! the `AgentExecutionState` ownership invariant.

/// Default budget applied when a request omits `budget_usd`.
pub const DEFAULT_BUDGET_USD: f64 = 10.0;

/// Fraction of the budget consumed before a warning becomes due.
pub const BUDGET_WARNING_THRESHOLD: f64 = 0.8;

/// Fallback cost-per-token rate used when a provider doesn't report cost
/// directly: `total_tokens * FALLBACK_COST_PER_TOKEN`.
pub const FALLBACK_COST_PER_TOKEN: f64 = 0.00001;

/// Tracks cumulative spend for one workflow execution.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budget_limit: f64,
    cost: f64,
    warning_threshold: f64,
    warning_sent: bool,
}

impl BudgetTracker {
    /// Create a tracker with the given limit and the default warning threshold.
    pub fn new(budget_limit: f64) -> Self {
        Self::with_warning_threshold(budget_limit, BUDGET_WARNING_THRESHOLD)
    }

    pub fn with_warning_threshold(budget_limit: f64, warning_threshold: f64) -> Self {
        Self {
            budget_limit: budget_limit.max(0.0),
            cost: 0.0,
            warning_threshold,
            warning_sent: false,
        }
    }

    /// Add a positive amount to cumulative cost. Negative/zero amounts are
    /// ignored so `cost` stays monotonically non-decreasing (invariant 2).
    pub fn add_cost(&mut self, amount: f64) {
        if amount > 0.0 {
            self.cost += amount;
        }
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn budget_limit(&self) -> f64 {
        self.budget_limit
    }

    /// Replace the budget limit (used by the `update_budget` signal). Clears
    /// the exceeded condition implicitly if the new limit is above cost.
    pub fn set_budget_limit(&mut self, new_limit: f64) {
        self.budget_limit = new_limit.max(0.0);
    }

    pub fn get_remaining(&self) -> f64 {
        (self.budget_limit - self.cost).max(0.0)
    }

    pub fn get_usage_percentage(&self) -> f64 {
        if self.budget_limit <= 0.0 {
            return 1.0;
        }
        (self.cost / self.budget_limit).min(1.0)
    }

    /// `is_exceeded ⇔ cost ≥ budget_limit`.
    pub fn is_exceeded(&self) -> bool {
        self.cost >= self.budget_limit
    }

    /// Whether a `projected_cost` addition would push cumulative cost over the
    /// limit, used to gate the main loop before an LLM call is made.
    pub fn would_exceed(&self, projected_cost: f64) -> bool {
        self.cost + projected_cost.max(0.0) >= self.budget_limit
    }

    /// A warning is due iff usage has crossed the threshold and none has been
    /// sent yet for this execution (invariant 3: at most one warning).
    pub fn should_warn(&self) -> bool {
        !self.warning_sent && self.get_usage_percentage() >= self.warning_threshold
    }

    pub fn mark_warning_sent(&mut self) {
        self.warning_sent = true;
    }

    pub fn warning_sent(&self) -> bool {
        self.warning_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_cost_is_monotonic_and_additive() {
        let mut a = BudgetTracker::new(10.0);
        a.add_cost(1.0);
        a.add_cost(2.0);

        let mut b = BudgetTracker::new(10.0);
        b.add_cost(3.0);

        assert_eq!(a.cost(), b.cost());
    }

    #[test]
    fn negative_cost_is_ignored() {
        let mut tracker = BudgetTracker::new(10.0);
        tracker.add_cost(5.0);
        tracker.add_cost(-100.0);
        assert_eq!(tracker.cost(), 5.0);
    }

    #[test]
    fn is_exceeded_at_boundary() {
        let mut tracker = BudgetTracker::new(1.0);
        assert!(!tracker.is_exceeded());
        tracker.add_cost(1.0);
        assert!(tracker.is_exceeded());
    }

    #[test]
    fn warning_fires_once() {
        let mut tracker = BudgetTracker::new(10.0);
        tracker.add_cost(8.5);
        assert!(tracker.should_warn());
        tracker.mark_warning_sent();
        assert!(!tracker.should_warn());
        tracker.add_cost(0.1);
        assert!(!tracker.should_warn());
    }

    #[test]
    fn would_exceed_checks_projection_without_mutating() {
        let tracker = BudgetTracker::new(1.0);
        assert!(tracker.would_exceed(1.0));
        assert!(!tracker.would_exceed(0.5));
        assert_eq!(tracker.cost(), 0.0);
    }

    #[test]
    fn update_budget_can_clear_exceeded() {
        let mut tracker = BudgetTracker::new(1.0);
        tracker.add_cost(1.0);
        assert!(tracker.is_exceeded());
        tracker.set_budget_limit(5.0);
        assert!(!tracker.is_exceeded());
    }
}
