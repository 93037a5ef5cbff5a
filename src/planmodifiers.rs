//! Attribute plan modifiers.
//!
//! A plan modifier sees one attribute's configured, prior and planned values
//! (plus the whole records, for modifiers that depend on a sibling such as
//! `cloud`) and may rewrite the planned value or ask for replacement.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::value::{is_unknown, UNKNOWN_VALUE};

/// Inputs to a plan modifier.
#[derive(Debug, Clone, Copy)]
pub struct PlanModifierRequest<'a> {
    /// Dotted path of the attribute, e.g. `default_node_pool.subnet_ids`.
    pub path: &'a str,
    /// Configured value of the attribute.
    pub config: &'a Value,
    /// Prior state value. `None` while creating.
    pub state: Option<&'a Value>,
    /// Planned value as left by the previous modifiers.
    pub plan: &'a Value,
    /// The whole configuration record.
    pub config_record: &'a Value,
    /// The whole prior state record, if any.
    pub state_record: Option<&'a Value>,
    /// The whole planned record.
    pub plan_record: &'a Value,
}

impl PlanModifierRequest<'_> {
    /// True when the planned value differs from the prior state of an
    /// existing resource.
    pub fn is_update_with_change(&self) -> bool {
        match self.state {
            Some(state) => self.state_record.is_some_and(|r| !r.is_null()) && state != self.plan,
            None => false,
        }
    }
}

/// Outputs of a plan modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanModifierResponse {
    /// The (possibly rewritten) planned value.
    pub plan_value: Value,
    /// Whether a change of this attribute forces replacement.
    pub requires_replace: bool,
}

/// Rewrites one attribute of a plan.
pub trait PlanModifier: Send + Sync + fmt::Debug {
    /// Human-readable description used in documentation.
    fn description(&self) -> String;

    /// Modify the planned value in `resp`.
    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse);
}

/// Keep the prior state value when the plan would otherwise be unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsePriorStateForUnknown;

impl PlanModifier for UsePriorStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if !is_unknown(&resp.plan_value) {
            return;
        }
        if let Some(state) = req.state.filter(|s| !s.is_null()) {
            resp.plan_value = state.clone();
        }
    }
}

/// Replace the resource whenever the attribute changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces replacement".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.is_update_with_change() {
            resp.requires_replace = true;
        }
    }
}

/// Predicate over (state, config, plan) used by [`RequiresReplaceIf`].
pub type ReplacePredicate = Arc<dyn Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync>;

/// Replace the resource when the attribute changes and a predicate holds.
#[derive(Clone)]
pub struct RequiresReplaceIf {
    predicate: ReplacePredicate,
    description: String,
}

impl RequiresReplaceIf {
    /// Build a conditional requires-replace modifier.
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&PlanModifierRequest<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: description.into(),
        }
    }
}

impl fmt::Debug for RequiresReplaceIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequiresReplaceIf")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PlanModifier for RequiresReplaceIf {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if req.is_update_with_change() && (self.predicate)(req) {
            resp.requires_replace = true;
        }
    }
}

/// Replace the resource when the attribute changes and the record's `cloud`
/// equals a fixed token.
#[derive(Debug, Clone)]
pub struct RequiresReplaceIfCloudEquals {
    cloud: String,
}

impl RequiresReplaceIfCloudEquals {
    /// Compare against a lowercase cloud token such as `"azure"`.
    pub fn new(cloud: impl Into<String>) -> Self {
        Self {
            cloud: cloud.into().to_lowercase(),
        }
    }

    fn record_cloud(record: Option<&Value>) -> Option<String> {
        record
            .and_then(|r| r.get("cloud"))
            .and_then(Value::as_str)
            .filter(|s| *s != UNKNOWN_VALUE)
            .map(str::to_lowercase)
    }
}

impl PlanModifier for RequiresReplaceIfCloudEquals {
    fn description(&self) -> String {
        format!("changing this attribute forces replacement on {}", self.cloud)
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        if !req.is_update_with_change() {
            return;
        }
        let cloud = Self::record_cloud(Some(req.plan_record))
            .or_else(|| Self::record_cloud(req.state_record));
        if cloud.as_deref() == Some(self.cloud.as_str()) {
            resp.requires_replace = true;
        }
    }
}

/// Always plan a null value; drift is reported by the remote status instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceStatusAlwaysNull;

impl PlanModifier for ResourceStatusAlwaysNull {
    fn description(&self) -> String {
        "status is refreshed on every read".to_string()
    }

    fn modify(&self, _req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        resp.plan_value = Value::Null;
    }
}

/// Equality used by [`DiffSuppress`].
pub type EqualFn = fn(&Value, &Value) -> bool;

/// Keep the prior state when the configured value is equivalent to it.
#[derive(Clone, Copy)]
pub struct DiffSuppress {
    is_equal: EqualFn,
}

impl DiffSuppress {
    /// Build a diff suppressor from an equivalence check.
    pub fn new(is_equal: EqualFn) -> Self {
        Self { is_equal }
    }

    /// Treat strings that differ only in leading or trailing whitespace as
    /// equal.
    pub fn trimmed_whitespace() -> Self {
        Self::new(|a, b| match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => a.trim() == b.trim(),
            _ => a == b,
        })
    }
}

impl fmt::Debug for DiffSuppress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffSuppress").finish_non_exhaustive()
    }
}

impl PlanModifier for DiffSuppress {
    fn description(&self) -> String {
        "equivalent values do not produce a diff".to_string()
    }

    fn modify(&self, req: &PlanModifierRequest<'_>, resp: &mut PlanModifierResponse) {
        let Some(state) = req.state else {
            return;
        };
        if state.is_null() || req.config.is_null() || is_unknown(req.config) {
            return;
        }
        if req.config != state && (self.is_equal)(req.config, state) {
            resp.plan_value = state.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(
        modifier: &dyn PlanModifier,
        config: &Value,
        state: Option<&Value>,
        plan: &Value,
        records: (&Value, Option<&Value>),
    ) -> PlanModifierResponse {
        let req = PlanModifierRequest {
            path: "attr",
            config,
            state,
            plan,
            config_record: records.0,
            state_record: records.1,
            plan_record: records.0,
        };
        let mut resp = PlanModifierResponse {
            plan_value: plan.clone(),
            requires_replace: false,
        };
        modifier.modify(&req, &mut resp);
        resp
    }

    #[test]
    fn test_use_prior_state_for_unknown() {
        let unknown = json!(UNKNOWN_VALUE);
        let record = json!({});
        let prior = json!({"id": "vn-1"});

        let resp = run(
            &UsePriorStateForUnknown,
            &json!(null),
            Some(&json!("vn-1")),
            &unknown,
            (&record, Some(&prior)),
        );
        assert_eq!(resp.plan_value, json!("vn-1"));

        let resp = run(
            &UsePriorStateForUnknown,
            &json!(null),
            None,
            &unknown,
            (&record, None),
        );
        assert_eq!(resp.plan_value, unknown);
    }

    #[test]
    fn test_requires_replace_only_on_change() {
        let record = json!({});
        let prior = json!({});
        let changed = run(
            &RequiresReplace,
            &json!("b"),
            Some(&json!("a")),
            &json!("b"),
            (&record, Some(&prior)),
        );
        assert!(changed.requires_replace);

        let same = run(
            &RequiresReplace,
            &json!("a"),
            Some(&json!("a")),
            &json!("a"),
            (&record, Some(&prior)),
        );
        assert!(!same.requires_replace);

        let create = run(&RequiresReplace, &json!("a"), None, &json!("a"), (&record, None));
        assert!(!create.requires_replace);
    }

    #[test]
    fn test_requires_replace_if_cloud_equals() {
        let modifier = RequiresReplaceIfCloudEquals::new("azure");
        let azure = json!({"cloud": "azure"});
        let aws = json!({"cloud": "aws"});

        let resp = run(
            &modifier,
            &json!("b"),
            Some(&json!("a")),
            &json!("b"),
            (&azure, Some(&azure)),
        );
        assert!(resp.requires_replace);

        let resp = run(
            &modifier,
            &json!("b"),
            Some(&json!("a")),
            &json!("b"),
            (&aws, Some(&aws)),
        );
        assert!(!resp.requires_replace);
    }

    #[test]
    fn test_requires_replace_if_predicate() {
        let modifier = RequiresReplaceIf::new("grows only", |req| {
            let before = req.state.and_then(Value::as_i64).unwrap_or(0);
            let after = req.plan.as_i64().unwrap_or(0);
            after < before
        });
        let record = json!({});
        let shrink = run(
            &modifier,
            &json!(10),
            Some(&json!(20)),
            &json!(10),
            (&record, Some(&record)),
        );
        assert!(shrink.requires_replace);

        let grow = run(
            &modifier,
            &json!(30),
            Some(&json!(20)),
            &json!(30),
            (&record, Some(&record)),
        );
        assert!(!grow.requires_replace);
    }

    #[test]
    fn test_resource_status_always_null() {
        let record = json!({});
        let resp = run(
            &ResourceStatusAlwaysNull,
            &json!(null),
            Some(&json!({"vm": "drifted"})),
            &json!({"vm": "drifted"}),
            (&record, Some(&record)),
        );
        assert_eq!(resp.plan_value, Value::Null);
    }

    #[test]
    fn test_diff_suppress_whitespace() {
        let record = json!({});
        let resp = run(
            &DiffSuppress::trimmed_whitespace(),
            &json!("ssh-rsa AAA\n"),
            Some(&json!("ssh-rsa AAA")),
            &json!("ssh-rsa AAA\n"),
            (&record, Some(&record)),
        );
        assert_eq!(resp.plan_value, json!("ssh-rsa AAA"));

        let resp = run(
            &DiffSuppress::trimmed_whitespace(),
            &json!("ssh-rsa BBB"),
            Some(&json!("ssh-rsa AAA")),
            &json!("ssh-rsa BBB"),
            (&record, Some(&record)),
        );
        assert_eq!(resp.plan_value, json!("ssh-rsa BBB"));
    }
}
