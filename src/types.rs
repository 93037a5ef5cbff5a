//! JSON-level counterparts of the host protocol messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated::provider as proto;

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix output by providers.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// A change to one top-level attribute between the prior state and the plan.
///
/// `before` is `None` when the attribute is being set for the first time and
/// `after` is `None` when it is being cleared. A JSON `null` on either side
/// counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute path.
    pub path: String,
    /// The prior value.
    pub before: Option<Value>,
    /// The planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Compare two sides of an attribute; `None` when nothing changes.
    pub fn between(
        path: impl Into<String>,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Option<Self> {
        let before = before.filter(|v| !v.is_null());
        let after = after.filter(|v| !v.is_null());
        if before == after {
            return None;
        }
        Some(Self {
            path: path.into(),
            before: before.cloned(),
            after: after.cloned(),
        })
    }

    /// Whether the attribute goes from absent to set.
    pub fn is_addition(&self) -> bool {
        self.before.is_none()
    }

    /// Whether the attribute goes from set to absent.
    pub fn is_removal(&self) -> bool {
        self.after.is_none()
    }
}

fn encode_side(side: Option<Value>) -> Vec<u8> {
    side.and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<AttributeChange> for proto::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_side(change.before),
            after: encode_side(change.after),
        }
    }
}

/// What a plan call produces: the planned state, the per-attribute diff and
/// the attribute paths whose change forces the resource to be replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state; `null` when the resource is being destroyed.
    pub planned_state: Value,
    /// Top-level attribute changes, ordered by path.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be replaced rather than updated.
    pub requires_replace: bool,
    /// The changed attributes that force replacement.
    #[serde(default)]
    pub replace_paths: Vec<String>,
}

impl PlanResult {
    /// A plan that leaves `state` as it is.
    pub fn no_change(state: Value) -> Self {
        Self::new(state, Vec::new(), Vec::new())
    }

    /// Build a plan; replacement is required whenever a replace path is given.
    pub fn new(planned_state: Value, changes: Vec<AttributeChange>, replace_paths: Vec<String>) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: !replace_paths.is_empty(),
            replace_paths,
        }
    }
}

/// A resource located by id during import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type name, e.g. `virtual_network`.
    pub resource_type: String,
    /// The state seeded for the following read.
    pub state: Value,
}

impl ImportedResource {
    /// Seed an import with the given state.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// The type names returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether destroy is planned through PlanResourceChange.
    pub plan_destroy: bool,
}

impl From<ServerCapabilities> for proto::ServerCapabilities {
    fn from(caps: ServerCapabilities) -> Self {
        Self {
            plan_destroy: caps.plan_destroy,
        }
    }
}
