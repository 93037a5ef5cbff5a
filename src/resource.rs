//! The generic resource lifecycle.
//!
//! Each resource kind supplies a typed [`Record`] mirroring its schema and a
//! [`ResourceCodec`] that maps that record to and from the remote service.
//! [`ResourceAdapter`] wraps a codec into the JSON-level [`DynResource`] the
//! provider dispatches to, and implements everything the kinds share:
//! validation, plan computation, refresh before read, not-found handling on
//! read and delete, and import.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::context::ProviderContext;
use crate::enums::CloudProvider;
use crate::error::ProviderError;
use crate::plan::{apply_plan_modifiers, finish, mark_computed, merge_top_level};
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;
use crate::value::{StringValue, UNKNOWN_VALUE};

/// The typed, host-visible shape of a resource.
pub trait Record: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {
    /// The resource id.
    fn id(&self) -> &StringValue;

    /// The cloud the resource lives in, when the record says so.
    fn cloud(&self) -> Option<CloudProvider> {
        None
    }

    /// Cross-attribute checks the schema cannot express.
    fn validate_config(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Adjust the plan given the configuration. Returns the new plan and any
    /// paths whose change forces replacement, or `None` to leave the plan
    /// alone.
    fn update_plan(&self, config: &Self) -> Option<(Self, Vec<String>)> {
        let _ = config;
        None
    }

    /// The known id, or an error naming the operation that needed it.
    fn require_id(&self, operation: &str) -> Result<String, ProviderError> {
        self.id().as_known().cloned().ok_or_else(|| {
            ProviderError::Validation(format!("cannot {} a resource without a known id", operation))
        })
    }
}

/// Maps one resource kind onto the remote service.
#[async_trait]
pub trait ResourceCodec: Send + Sync + 'static {
    /// The record type.
    type Model: Record;

    /// The host-facing type name, e.g. `virtual_network`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Create the resource and return its state.
    async fn create(
        &self,
        ctx: &ProviderContext,
        model: Self::Model,
    ) -> Result<Self::Model, ProviderError>;

    /// Read the resource's current state.
    async fn read(
        &self,
        ctx: &ProviderContext,
        model: Self::Model,
    ) -> Result<Self::Model, ProviderError>;

    /// Update the resource in place and return its state.
    async fn update(
        &self,
        ctx: &ProviderContext,
        model: Self::Model,
    ) -> Result<Self::Model, ProviderError>;

    /// Delete the resource.
    async fn delete(&self, ctx: &ProviderContext, model: Self::Model) -> Result<(), ProviderError>;
}

/// A resource as the provider sees it: JSON in, JSON out.
#[async_trait]
pub trait DynResource: Send + Sync {
    /// The host-facing type name.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Compute the plan for a proposed state.
    fn modify_plan(
        &self,
        prior: Option<Value>,
        proposed: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create from a planned state.
    async fn create(&self, ctx: &ProviderContext, planned: Value) -> Result<Value, ProviderError>;

    /// Read the current state; JSON null when the resource is gone.
    async fn read(&self, ctx: &ProviderContext, current: Value) -> Result<Value, ProviderError>;

    /// Update from prior to planned state.
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the resource.
    async fn delete(&self, ctx: &ProviderContext, current: Value) -> Result<(), ProviderError>;

    /// Start tracking an existing resource by id.
    fn import(&self, id: &str) -> ImportedResource;
}

/// Decode host JSON into a record; null decodes to the default record.
pub fn decode_record<T: Record>(value: &Value) -> Result<T, ProviderError> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value.clone())?)
}

fn record_errors(record: &impl Record) -> Result<(), ProviderError> {
    let diagnostics = record.validate_config();
    if !has_errors(&diagnostics) {
        return Ok(());
    }
    let message = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProviderError::Validation(message))
}

/// Validate `config` against `schema`, then run the record's own checks when
/// the structure is sound.
pub fn validate_record<T: Record>(schema: &Schema, config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(schema, config);
    if has_errors(&diagnostics) {
        return diagnostics;
    }
    match decode_record::<T>(config) {
        Ok(record) => diagnostics.extend(record.validate_config()),
        Err(e) => {
            diagnostics.push(Diagnostic::error("Invalid configuration").with_detail(e.message()))
        }
    }
    diagnostics
}

/// Binds a [`ResourceCodec`] to the shared lifecycle.
pub struct ResourceAdapter<C: ResourceCodec> {
    codec: C,
    schema: Schema,
}

impl<C: ResourceCodec> ResourceAdapter<C> {
    /// Wrap a codec.
    pub fn new(codec: C) -> Self {
        let schema = codec.schema();
        Self { codec, schema }
    }
}

#[async_trait]
impl<C: ResourceCodec> DynResource for ResourceAdapter<C> {
    fn type_name(&self) -> &'static str {
        self.codec.type_name()
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_record::<C::Model>(&self.schema, config)
    }

    fn modify_plan(
        &self,
        prior: Option<Value>,
        proposed: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        if proposed.is_null() {
            return Ok(PlanResult::no_change(Value::Null));
        }
        let prior = prior.filter(|p| !p.is_null());

        let mut planned = proposed;
        mark_computed(&self.schema, prior.as_ref(), &mut planned, &config);
        let mut replace_paths =
            apply_plan_modifiers(&self.schema, prior.as_ref(), &mut planned, &config);

        let record: C::Model = decode_record(&planned)?;
        let config_record: C::Model = decode_record(&config)?;
        if let Some((updated, paths)) = record.update_plan(&config_record) {
            let before = serde_json::to_value(&record)?;
            let after = serde_json::to_value(&updated)?;
            merge_top_level(&mut planned, &before, &after);
            replace_paths.extend(paths);
        }

        let result = finish(prior.as_ref(), planned, replace_paths);
        debug!(
            resource_type = self.type_name(),
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan computed"
        );
        Ok(result)
    }

    async fn create(&self, ctx: &ProviderContext, planned: Value) -> Result<Value, ProviderError> {
        let model: C::Model = decode_record(&planned)?;
        record_errors(&model)?;

        info!(resource_type = self.type_name(), "Creating resource");
        let created = self.codec.create(ctx, model).await?;
        info!(
            resource_type = self.type_name(),
            id = created.id().as_known().map(String::as_str).unwrap_or_default(),
            "Resource created"
        );
        Ok(serde_json::to_value(created)?)
    }

    async fn read(&self, ctx: &ProviderContext, current: Value) -> Result<Value, ProviderError> {
        if current.is_null() {
            return Ok(Value::Null);
        }
        let model: C::Model = decode_record(&current)?;
        let id = model.require_id("read")?;

        if let Some(cloud) = model.cloud() {
            ctx.refresh(cloud).await?;
        }

        debug!(resource_type = self.type_name(), id = %id, "Reading resource");
        match self.codec.read(ctx, model).await {
            Ok(state) => Ok(serde_json::to_value(state)?),
            Err(e) if e.is_not_found() => {
                warn!(
                    resource_type = self.type_name(),
                    id = %id,
                    "Resource no longer exists, removing from state"
                );
                Ok(Value::Null)
            }
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let mut planned = planned;
        let planned_id_known = planned
            .get("id")
            .and_then(Value::as_str)
            .is_some_and(|id| id != UNKNOWN_VALUE);
        if !planned_id_known {
            if let (Some(id), Value::Object(map)) = (prior.get("id").cloned(), &mut planned) {
                map.insert("id".to_string(), id);
            }
        }

        let model: C::Model = decode_record(&planned)?;
        record_errors(&model)?;
        let id = model.require_id("update")?;

        info!(resource_type = self.type_name(), id = %id, "Updating resource");
        let updated = self.codec.update(ctx, model).await?;
        Ok(serde_json::to_value(updated)?)
    }

    async fn delete(&self, ctx: &ProviderContext, current: Value) -> Result<(), ProviderError> {
        if current.is_null() {
            return Ok(());
        }
        let model: C::Model = decode_record(&current)?;
        let id = model.require_id("delete")?;

        info!(resource_type = self.type_name(), id = %id, "Deleting resource");
        match self.codec.delete(ctx, model).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() || e.is_ok_code() => {
                debug!(
                    resource_type = self.type_name(),
                    id = %id,
                    "Resource already gone"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn import(&self, id: &str) -> ImportedResource {
        info!(resource_type = self.type_name(), id = %id, "Importing resource");
        ImportedResource::new(self.type_name(), json!({ "id": id }))
    }
}

/// A data source as the provider sees it.
#[async_trait]
pub trait DynDataSource: Send + Sync {
    /// The host-facing type name.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Look the data up.
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError>;
}
