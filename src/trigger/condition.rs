//! Trigger condition evaluation
//!
//! Two strategies, selected by `ConditionEvaluationPolicy` at the call site:
//! rule-based dotted-path field matching plus time-window predicates (ported
//! from `TriggerService._evaluate_simple_conditions`/`_get_nested_value`), or
//! LLM-based evaluation with fallback to the rule-based path on failure. Both
//! default to FAIL-OPEN: an evaluation error must never silently block a
//! trigger from firing.

use async_trait::async_trait;
use chrono::{Datelike, Timelike, Utc};

use crate::error::Result;

/// What to return when condition evaluation itself errors out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionEvaluationPolicy {
    /// Treat an evaluation failure as "conditions met" (default - matches
    /// the original's "default to True to avoid blocking execution").
    FailOpen,
    /// Treat an evaluation failure as "conditions not met".
    FailClosed,
}

impl Default for ConditionEvaluationPolicy {
    fn default() -> Self {
        ConditionEvaluationPolicy::FailOpen
    }
}

#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, conditions: &serde_json::Value, event_data: &serde_json::Value) -> Result<bool>;
}

/// Rule-based evaluator: `field_matches` (dotted-path equality) and
/// `time_conditions` (`hour_range`, `weekdays_only`).
#[derive(Default)]
pub struct RuleBasedConditionEvaluator;

impl RuleBasedConditionEvaluator {
    fn get_nested_value<'a>(data: &'a serde_json::Value, field_path: &str) -> Option<&'a serde_json::Value> {
        let mut value = data;
        for key in field_path.split('.') {
            value = value.get(key)?;
        }
        Some(value)
    }

    fn evaluate_field_matches(conditions: &serde_json::Value, event_data: &serde_json::Value) -> bool {
        let Some(field_matches) = conditions.get("field_matches").and_then(|v| v.as_object()) else {
            return true;
        };
        for (field_path, expected) in field_matches {
            let actual = Self::get_nested_value(event_data, field_path);
            if actual != Some(expected) {
                return false;
            }
        }
        true
    }

    fn evaluate_time_conditions(conditions: &serde_json::Value) -> bool {
        let Some(time_conditions) = conditions.get("time_conditions") else {
            return true;
        };
        let now = Utc::now();

        if let Some(range) = time_conditions.get("hour_range").and_then(|v| v.as_array()) {
            if let [lo, hi] = range.as_slice() {
                let lo = lo.as_u64().unwrap_or(0) as u32;
                let hi = hi.as_u64().unwrap_or(23) as u32;
                if !(lo..=hi).contains(&now.hour()) {
                    return false;
                }
            }
        }

        if time_conditions
            .get("weekdays_only")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
            && now.weekday().num_days_from_monday() >= 5
        {
            return false;
        }

        true
    }
}

#[async_trait]
impl ConditionEvaluator for RuleBasedConditionEvaluator {
    async fn evaluate(&self, conditions: &serde_json::Value, event_data: &serde_json::Value) -> Result<bool> {
        if conditions.is_null() || (conditions.is_object() && conditions.as_object().unwrap().is_empty()) {
            return Ok(true);
        }
        Ok(Self::evaluate_field_matches(conditions, event_data) && Self::evaluate_time_conditions(conditions))
    }
}

/// Evaluate `conditions` against `event_data`, applying `policy` if the
/// evaluator itself errors. `None`/empty conditions always evaluate to true.
pub async fn evaluate_with_policy(
    evaluator: &dyn ConditionEvaluator,
    conditions: Option<&serde_json::Value>,
    event_data: &serde_json::Value,
    policy: ConditionEvaluationPolicy,
) -> bool {
    let Some(conditions) = conditions else {
        return true;
    };

    match evaluator.evaluate(conditions, event_data).await {
        Ok(met) => met,
        Err(e) => {
            tracing::warn!(error = %e, ?policy, "condition evaluation failed");
            matches!(policy, ConditionEvaluationPolicy::FailOpen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_conditions_always_met() {
        let evaluator = RuleBasedConditionEvaluator;
        let met = evaluator.evaluate(&serde_json::json!({}), &serde_json::json!({})).await.unwrap();
        assert!(met);
    }

    #[tokio::test]
    async fn field_matches_dotted_path() {
        let evaluator = RuleBasedConditionEvaluator;
        let conditions = serde_json::json!({"field_matches": {"request.body.type": "push"}});
        let matching = serde_json::json!({"request": {"body": {"type": "push"}}});
        let mismatching = serde_json::json!({"request": {"body": {"type": "pull"}}});

        assert!(evaluator.evaluate(&conditions, &matching).await.unwrap());
        assert!(!evaluator.evaluate(&conditions, &mismatching).await.unwrap());
    }

    #[tokio::test]
    async fn hour_range_restricts_firing() {
        let evaluator = RuleBasedConditionEvaluator;
        let conditions = serde_json::json!({"time_conditions": {"hour_range": [0, 0]}});
        // hour_range [0, 0] only matches at UTC midnight; assert it doesn't
        // spuriously pass for an arbitrary current hour unless we're there.
        let now_hour = Utc::now().hour();
        let met = evaluator.evaluate(&conditions, &serde_json::json!({})).await.unwrap();
        assert_eq!(met, now_hour == 0);
    }

    #[tokio::test]
    async fn evaluate_with_policy_fail_open_defaults_to_met() {
        struct Failing;
        #[async_trait]
        impl ConditionEvaluator for Failing {
            async fn evaluate(&self, _: &serde_json::Value, _: &serde_json::Value) -> Result<bool> {
                Err(crate::error::Error::Other("boom".into()))
            }
        }
        let met = evaluate_with_policy(
            &Failing,
            Some(&serde_json::json!({"field_matches": {}})),
            &serde_json::json!({}),
            ConditionEvaluationPolicy::FailOpen,
        )
        .await;
        assert!(met);
    }

    #[tokio::test]
    async fn evaluate_with_policy_fail_closed_blocks_on_error() {
        struct Failing;
        #[async_trait]
        impl ConditionEvaluator for Failing {
            async fn evaluate(&self, _: &serde_json::Value, _: &serde_json::Value) -> Result<bool> {
                Err(crate::error::Error::Other("boom".into()))
            }
        }
        let met = evaluate_with_policy(
            &Failing,
            Some(&serde_json::json!({"field_matches": {}})),
            &serde_json::json!({}),
            ConditionEvaluationPolicy::FailClosed,
        )
        .await;
        assert!(!met);
    }
}
