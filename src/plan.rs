//! Schema-driven plan computation.
//!
//! A resource plan is built in stages over the JSON proposed by the host:
//!
//! 1. [`mark_computed`]: computed attributes the user did not configure
//!    become unknown when the provider may change them.
//! 2. [`apply_plan_modifiers`]: every attribute's plan modifiers run in
//!    declaration order and report the paths that force replacement.
//! 3. The record's own plan hook runs (see [`crate::resource`]); its edits are
//!    folded back with [`merge_top_level`].
//! 4. [`finish`]: attribute changes are diffed and replace paths that did not
//!    actually change are dropped.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::planmodifiers::{PlanModifierRequest, PlanModifierResponse};
use crate::schema::{Attribute, Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::value::unknown;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn render(path: &[Segment]) -> String {
    path.iter()
        .map(|segment| match segment {
            Segment::Key(key) => key.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn get<'v>(value: &'v Value, path: &[Segment]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match segment {
        Segment::Key(key) => current.get(key.as_str()),
        Segment::Index(i) => current.get(*i),
    })
}

fn set(value: &mut Value, path: &[Segment], new_value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *value = new_value;
        return;
    };
    let mut current = value;
    for segment in parents {
        let next = match segment {
            Segment::Key(key) => current.get_mut(key.as_str()),
            Segment::Index(i) => current.get_mut(*i),
        };
        match next {
            Some(next) => current = next,
            None => return,
        }
    }
    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), new_value);
        }
        (Segment::Index(i), Value::Array(items)) if *i < items.len() => {
            items[*i] = new_value;
        }
        _ => {}
    }
}

/// Look up a dotted path such as `rule.0.priority`. Numeric segments index
/// into lists.
pub fn value_at_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(segment),
    })
}

fn field<'v>(value: Option<&'v Value>, name: &str) -> &'v Value {
    value.and_then(|v| v.get(name)).unwrap_or(&NULL)
}

fn is_absent(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

/// True when any user-settable attribute or block differs between the prior
/// state and the plan. Optional+computed attributes the user left unset do
/// not count.
pub fn has_configured_change(block: &Block, prior: &Value, planned: &Value, config: &Value) -> bool {
    let attribute_changed = block.attributes.iter().any(|(name, attr)| {
        if attr.flags.is_computed_only() {
            return false;
        }
        let configured = field(Some(config), name);
        if attr.flags.computed && configured.is_null() {
            return false;
        }
        field(Some(prior), name) != field(Some(planned), name)
    });
    if attribute_changed {
        return true;
    }

    block.blocks.iter().any(|(name, nested)| {
        let prior = field(Some(prior), name);
        let planned = field(Some(planned), name);
        let config = field(Some(config), name);
        match nested.nesting_mode {
            BlockNestingMode::Single => match (prior.is_null(), planned.is_null()) {
                (true, true) => false,
                (false, false) => has_configured_change(&nested.block, prior, planned, config),
                _ => true,
            },
            BlockNestingMode::List => {
                let empty = Vec::new();
                let prior_items = prior.as_array().unwrap_or(&empty);
                let planned_items = planned.as_array().unwrap_or(&empty);
                if prior_items.len() != planned_items.len() {
                    return true;
                }
                prior_items.iter().zip(planned_items).enumerate().any(|(i, (p, n))| {
                    has_configured_change(&nested.block, p, n, config.get(i).unwrap_or(&NULL))
                })
            }
        }
    })
}

/// Mark computed attributes that the user did not configure.
///
/// While creating, a null value becomes unknown. While updating, the value
/// becomes unknown if anything configurable changed and otherwise keeps the
/// prior state.
pub fn mark_computed(schema: &Schema, prior: Option<&Value>, planned: &mut Value, config: &Value) {
    let prior = prior.filter(|p| !p.is_null());
    let changed = match prior {
        Some(prior) => has_configured_change(&schema.block, prior, planned, config),
        None => false,
    };
    mark_block(&schema.block, prior, planned, config, prior.is_none(), changed);
}

fn mark_block(
    block: &Block,
    prior: Option<&Value>,
    planned: &mut Value,
    config: &Value,
    creating: bool,
    changed: bool,
) {
    let Value::Object(map) = planned else {
        return;
    };

    for (name, attr) in &block.attributes {
        if !attr.flags.computed || !is_absent(config.get(name.as_str())) {
            continue;
        }
        let current = map.get(name.as_str());
        if creating || prior.is_none() {
            if is_absent(current) {
                map.insert(name.clone(), unknown());
            }
        } else if changed {
            map.insert(name.clone(), unknown());
        } else if is_absent(current) {
            let prior_value = field(prior, name).clone();
            map.insert(name.clone(), prior_value);
        }
    }

    for (name, nested) in &block.blocks {
        let nested_prior = prior.and_then(|p| p.get(name.as_str())).filter(|p| !p.is_null());
        let nested_config = field(Some(config), name);
        let Some(nested_planned) = map.get_mut(name.as_str()) else {
            continue;
        };
        match nested.nesting_mode {
            BlockNestingMode::Single => mark_block(
                &nested.block,
                nested_prior,
                nested_planned,
                nested_config,
                creating,
                changed,
            ),
            BlockNestingMode::List => {
                if let Value::Array(items) = nested_planned {
                    for (i, item) in items.iter_mut().enumerate() {
                        mark_block(
                            &nested.block,
                            nested_prior.and_then(|p| p.get(i)),
                            item,
                            nested_config.get(i).unwrap_or(&NULL),
                            creating,
                            changed,
                        );
                    }
                }
            }
        }
    }
}

fn collect_sites<'s>(
    block: &'s Block,
    planned: &Value,
    prefix: &[Segment],
    out: &mut Vec<(Vec<Segment>, &'s Attribute)>,
) {
    for (name, attr) in &block.attributes {
        let mut path = prefix.to_vec();
        path.push(Segment::Key(name.clone()));
        out.push((path, attr));
    }

    for (name, nested) in &block.blocks {
        let mut path = prefix.to_vec();
        path.push(Segment::Key(name.clone()));
        match (nested.nesting_mode, get(planned, &path)) {
            (BlockNestingMode::Single, Some(Value::Object(_))) => {
                collect_sites(&nested.block, planned, &path, out);
            }
            (BlockNestingMode::List, Some(Value::Array(items))) => {
                for i in 0..items.len() {
                    let mut item_path = path.clone();
                    item_path.push(Segment::Index(i));
                    collect_sites(&nested.block, planned, &item_path, out);
                }
            }
            _ => {}
        }
    }
}

/// Run every attribute's plan modifiers over `planned`, returning the paths
/// whose modifiers asked for replacement.
pub fn apply_plan_modifiers(
    schema: &Schema,
    prior: Option<&Value>,
    planned: &mut Value,
    config: &Value,
) -> Vec<String> {
    if !planned.is_object() {
        return Vec::new();
    }
    let prior = prior.filter(|p| !p.is_null());
    let snapshot = planned.clone();

    let mut sites = Vec::new();
    collect_sites(&schema.block, &snapshot, &[], &mut sites);

    let mut replace_paths = Vec::new();
    for (path, attr) in sites {
        let modifiers = attr.effective_plan_modifiers();
        if modifiers.is_empty() {
            continue;
        }
        let rendered = render(&path);
        let config_value = get(config, &path).unwrap_or(&NULL);
        let state_value = prior.map(|p| get(p, &path).unwrap_or(&NULL));

        let mut resp = PlanModifierResponse {
            plan_value: get(planned, &path).cloned().unwrap_or(Value::Null),
            requires_replace: false,
        };
        for modifier in modifiers {
            let current = resp.plan_value.clone();
            let req = PlanModifierRequest {
                path: &rendered,
                config: config_value,
                state: state_value,
                plan: &current,
                config_record: config,
                state_record: prior,
                plan_record: &snapshot,
            };
            modifier.modify(&req, &mut resp);
        }

        if resp.requires_replace {
            replace_paths.push(rendered);
        }
        set(planned, &path, resp.plan_value);
    }
    replace_paths
}

/// Copy the top-level keys that differ between `before` and `after` into
/// `planned`. Used to fold a typed record's edits back without disturbing
/// values the record does not model exactly.
pub fn merge_top_level(planned: &mut Value, before: &Value, after: &Value) {
    let (Value::Object(planned), Some(after)) = (planned, after.as_object()) else {
        return;
    };
    for (key, value) in after {
        if before.get(key.as_str()) != Some(value) {
            planned.insert(key.clone(), value.clone());
        }
    }
}

fn top_level_changes(prior: Option<&Value>, planned: &Value) -> Vec<AttributeChange> {
    let empty = Map::new();
    let prior_map = prior.and_then(Value::as_object).unwrap_or(&empty);
    let planned_map = planned.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = prior_map.keys().chain(planned_map.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            AttributeChange::between(key.clone(), prior_map.get(key), planned_map.get(key))
        })
        .collect()
}

/// Diff the final plan against the prior state and keep only the replace
/// paths whose value actually changes.
pub fn finish(prior: Option<&Value>, planned: Value, replace_paths: Vec<String>) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());
    let changes = top_level_changes(prior, &planned);

    let mut kept: Vec<String> = Vec::new();
    if let Some(prior) = prior {
        for path in replace_paths {
            let before = value_at_path(prior, &path).unwrap_or(&NULL);
            let after = value_at_path(&planned, &path).unwrap_or(&NULL);
            if before != after && !kept.contains(&path) {
                kept.push(path);
            }
        }
    }

    PlanResult::new(planned, changes, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planmodifiers::{
        RequiresReplaceIfCloudEquals, ResourceStatusAlwaysNull, UsePriorStateForUnknown,
    };
    use crate::schema::{AttributeFlags, AttributeType, NestedBlock};
    use crate::value::{is_unknown, UNKNOWN_VALUE};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_plan_modifier(UsePriorStateForUnknown),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_plan_modifier(RequiresReplaceIfCloudEquals::new("azure")),
            )
            .with_attribute("cidr_block", Attribute::required_string().with_force_new())
            .with_attribute("cloud", Attribute::required_string().with_force_new())
            .with_attribute("port", Attribute::optional_computed_int64())
            .with_attribute(
                "resource_status",
                Attribute::new(
                    AttributeType::map(AttributeType::String),
                    AttributeFlags::computed(),
                )
                .with_plan_modifier(ResourceStatusAlwaysNull),
            )
            .with_block(
                "rule",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("priority", Attribute::required_int64().with_force_new())
                        .with_attribute("generated", Attribute::computed_string()),
                ),
            )
    }

    fn prior() -> Value {
        json!({
            "id": "vn-1",
            "name": "vn1",
            "cidr_block": "10.0.0.0/16",
            "cloud": "aws",
            "port": 5432,
            "resource_status": {"aws": "ok"},
            "rule": [{"priority": 100, "generated": "g-1"}],
        })
    }

    #[test]
    fn test_create_marks_computed_unknown() {
        let config = json!({"name": "vn1", "cidr_block": "10.0.0.0/16", "cloud": "aws"});
        let mut planned = config.clone();
        mark_computed(&schema(), None, &mut planned, &config);

        assert!(is_unknown(&planned["id"]));
        assert!(is_unknown(&planned["port"]));
        assert!(is_unknown(&planned["resource_status"]));

        let paths = apply_plan_modifiers(&schema(), None, &mut planned, &config);
        assert!(paths.is_empty());
        assert!(is_unknown(&planned["id"]));
        assert_eq!(planned["resource_status"], Value::Null);
    }

    #[test]
    fn test_update_without_change_keeps_prior_computed() {
        let config = json!({
            "name": "vn1", "cidr_block": "10.0.0.0/16", "cloud": "aws",
            "rule": [{"priority": 100}],
        });
        let mut planned = config.clone();
        mark_computed(&schema(), Some(&prior()), &mut planned, &config);

        assert_eq!(planned["id"], "vn-1");
        assert_eq!(planned["port"], 5432);
        assert_eq!(planned["rule"][0]["generated"], "g-1");

        let paths = apply_plan_modifiers(&schema(), Some(&prior()), &mut planned, &config);
        let result = finish(Some(&prior()), planned, paths);
        assert!(!result.requires_replace);
        let changed: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(changed, vec!["resource_status"]);
    }

    #[test]
    fn test_update_with_change_unknowns_computed_but_keeps_id() {
        let config = json!({
            "name": "vn2", "cidr_block": "10.0.0.0/16", "cloud": "aws",
            "rule": [{"priority": 100}],
        });
        let mut planned = config.clone();
        mark_computed(&schema(), Some(&prior()), &mut planned, &config);
        assert!(is_unknown(&planned["port"]));

        let paths = apply_plan_modifiers(&schema(), Some(&prior()), &mut planned, &config);
        assert_eq!(planned["id"], "vn-1");
        assert!(paths.is_empty(), "name only forces replacement on azure");

        let result = finish(Some(&prior()), planned, paths);
        assert!(!result.requires_replace);
        assert!(result.changes.iter().any(|c| c.path == "name"));
    }

    #[test]
    fn test_force_new_in_nested_list_reports_indexed_path() {
        let config = json!({
            "name": "vn1", "cidr_block": "10.1.0.0/16", "cloud": "aws",
            "rule": [{"priority": 200}],
        });
        let mut planned = config.clone();
        mark_computed(&schema(), Some(&prior()), &mut planned, &config);
        let paths = apply_plan_modifiers(&schema(), Some(&prior()), &mut planned, &config);

        assert!(paths.contains(&"cidr_block".to_string()));
        assert!(paths.contains(&"rule.0.priority".to_string()));

        let result = finish(Some(&prior()), planned, paths);
        assert!(result.requires_replace);
        assert_eq!(result.replace_paths, vec!["cidr_block", "rule.0.priority"]);
    }

    #[test]
    fn test_cloud_conditional_replace() {
        let mut prior = prior();
        prior["cloud"] = json!("azure");
        let config = json!({
            "name": "renamed", "cidr_block": "10.0.0.0/16", "cloud": "azure",
            "rule": [{"priority": 100}],
        });
        let mut planned = config.clone();
        mark_computed(&schema(), Some(&prior), &mut planned, &config);
        let paths = apply_plan_modifiers(&schema(), Some(&prior), &mut planned, &config);
        let result = finish(Some(&prior), planned, paths);
        assert_eq!(result.replace_paths, vec!["name"]);
    }

    #[test]
    fn test_replace_paths_that_did_not_change_are_dropped() {
        let planned = prior();
        let result = finish(Some(&prior()), planned, vec!["cidr_block".to_string()]);
        assert!(!result.requires_replace);
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_value_at_path() {
        let value = prior();
        assert_eq!(value_at_path(&value, "rule.0.priority"), Some(&json!(100)));
        assert_eq!(value_at_path(&value, "rule.1.priority"), None);
        assert_eq!(value_at_path(&value, "id"), Some(&json!("vn-1")));
    }

    #[test]
    fn test_merge_top_level_only_copies_edits() {
        let mut planned = json!({"port": UNKNOWN_VALUE, "name": "db"});
        let before = json!({"port": UNKNOWN_VALUE, "name": "db", "extra": null});
        let after = json!({"port": 3306, "name": "db", "extra": null});
        merge_top_level(&mut planned, &before, &after);
        assert_eq!(planned, json!({"port": 3306, "name": "db"}));
    }
}
