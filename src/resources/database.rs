//! Managed relational databases.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{common_args, name_attribute, to_i32, with_common, Common};
use super::Wire;
use crate::enums::{CloudProvider, DatabaseEngine, DatabaseSize, EnumType, EnumValue, Location};
use crate::generated::resources::{
    CreateDatabaseRequest, DatabaseArgs, DatabaseResource, UpdateDatabaseRequest,
};
use crate::planmodifiers::{PlanModifierRequest, RequiresReplaceIf, UsePriorStateForUnknown};
use crate::resource::Record;
use crate::schema::{Attribute, Schema};
use crate::validators::InRange;
use crate::value::{AttrValue, Int64Value, MapValue, StringValue, UNKNOWN_VALUE};

/// Database engines.
pub const ENGINES: EnumType<DatabaseEngine> = EnumType::new();

/// Database sizes.
pub const SIZES: EnumType<DatabaseSize> = EnumType::new();

/// The port an engine listens on unless told otherwise.
pub fn default_port(engine: DatabaseEngine) -> Option<i64> {
    match engine {
        DatabaseEngine::Mysql | DatabaseEngine::Mariadb => Some(3306),
        DatabaseEngine::Postgres => Some(5432),
        DatabaseEngine::UnknownEngine => None,
    }
}

/// State of a `database`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    /// Resource id.
    pub id: StringValue,
    /// Database name.
    pub name: StringValue,
    /// Engine.
    pub engine: EnumValue<DatabaseEngine>,
    /// Engine version, e.g. `5.7`.
    pub engine_version: StringValue,
    /// Allocated storage.
    pub storage_gb: Int64Value,
    /// Instance size.
    pub size: EnumValue<DatabaseSize>,
    /// Admin user.
    pub username: StringValue,
    /// Admin password.
    pub password: StringValue,
    /// Subnet to place the database in.
    pub subnet_id: StringValue,
    /// Listening port.
    pub port: Int64Value,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Host name to connect to.
    pub hostname: StringValue,
    /// User name to connect with; differs from `username` on some clouds.
    pub connection_username: StringValue,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for Database {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }

    fn update_plan(&self, config: &Self) -> Option<(Self, Vec<String>)> {
        let mut plan = self.clone();
        let mut replace = Vec::new();
        if config.port.is_null() {
            if let Some(port) = self.engine.get().and_then(default_port) {
                plan.port = AttrValue::Known(port);
                if self.cloud.get() == Some(CloudProvider::Azure) {
                    replace.push("port".to_string());
                }
            }
        }

        if plan == *self && replace.is_empty() {
            return None;
        }
        Some((plan, replace))
    }
}

impl Wire for Database {
    type Args = DatabaseArgs;
    type Reply = DatabaseResource;

    fn to_args(&self) -> DatabaseArgs {
        DatabaseArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            engine: self.engine.tag(),
            engine_version: self.engine_version.value_or_default(),
            storage_gb: self.storage_gb.value_or_default(),
            size: self.size.tag(),
            username: self.username.value_or_default(),
            password: self.password.value_or_default(),
            subnet_id: self.subnet_id.value_or_default(),
            port: to_i32(&self.port),
        }
    }

    fn from_reply(reply: DatabaseResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            engine: EnumValue::from_remote(reply.engine, &ENGINES),
            engine_version: AttrValue::Known(reply.engine_version),
            storage_gb: AttrValue::Known(reply.storage_gb),
            size: EnumValue::from_remote(reply.size, &SIZES),
            username: AttrValue::Known(reply.username),
            password: AttrValue::from_non_zero(reply.password),
            subnet_id: AttrValue::Known(reply.subnet_id),
            port: AttrValue::from_non_zero(i64::from(reply.port)),
            cloud: common.cloud,
            location: common.location,
            hostname: AttrValue::from_non_zero(reply.host),
            connection_username: AttrValue::from_non_zero(reply.connection_username),
            resource_status: common.resource_status,
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        if self.password.is_null() {
            self.password = sent.password.clone();
        }
        self.port.keep_zero_from(&sent.port);
    }
}

fn planned_on_azure(req: &PlanModifierRequest<'_>) -> bool {
    [Some(req.plan_record), req.state_record]
        .into_iter()
        .flatten()
        .filter_map(|record| record.get("cloud").and_then(Value::as_str))
        .find(|cloud| *cloud != UNKNOWN_VALUE)
        .is_some_and(|cloud| cloud.eq_ignore_ascii_case("azure"))
}

/// Schema of `database`.
pub fn database_schema() -> Schema {
    with_common(Schema::v0().with_description("A managed relational database"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "engine",
            Attribute::required_enum(ENGINES)
                .with_description("mysql, postgres or mariadb")
                .with_force_new(),
        )
        .with_attribute(
            "engine_version",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute("storage_gb", Attribute::required_int64())
        .with_attribute("size", Attribute::required_enum(SIZES))
        .with_attribute("username", Attribute::required_string().with_force_new())
        .with_attribute("password", Attribute::required_string().sensitive())
        .with_attribute("subnet_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "port",
            Attribute::optional_computed_int64()
                .with_description("Defaults to the engine's standard port")
                .with_validator(InRange::int32())
                .with_plan_modifier(UsePriorStateForUnknown)
                .with_plan_modifier(RequiresReplaceIf::new(
                    "changing the port forces replacement on azure",
                    planned_on_azure,
                )),
        )
        .with_attribute("hostname", Attribute::computed_string())
        .with_attribute("connection_username", Attribute::computed_string())
}

remote_resource! {
    /// Remote operations of `database`.
    DatabaseCodec for Database {
        type_name: "database",
        kind: "Database",
        schema: database_schema,
        create: CreateDatabaseRequest,
        update: UpdateDatabaseRequest,
    }
}
