//! Attributes and conversions shared by the resource kinds.

use std::collections::{BTreeMap, HashMap};

use crate::enums::{CloudProvider, EnumType, EnumValue, Location};
use crate::generated::resources::{CommonResourceParameters, ResourceCommonArgs};
use crate::planmodifiers::{ResourceStatusAlwaysNull, UsePriorStateForUnknown};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validators::NonEmpty;
use crate::value::{AttrValue, Int64Value, MapValue, StringValue};

/// Cloud tokens: `aws`, `azure`, `gcp`.
pub const CLOUDS: EnumType<CloudProvider> = EnumType::new();

/// Location tokens such as `us_east_1`.
pub const LOCATIONS: EnumType<Location> = EnumType::new();

/// The computed `id` every kind carries.
pub fn id_attribute() -> Attribute {
    Attribute::computed_string()
        .with_description("Identifier assigned by the remote service")
        .with_plan_modifier(UsePriorStateForUnknown)
}

/// A required `name`; the empty string is rejected.
pub fn name_attribute() -> Attribute {
    Attribute::required_string().with_validator(NonEmpty::<String>::new())
}

/// The `cloud` a resource is deployed to.
pub fn cloud_attribute() -> Attribute {
    Attribute::required_enum(CLOUDS)
        .with_description("Cloud provider to deploy to: aws, azure or gcp")
        .with_force_new()
}

/// The `location` a resource is deployed to.
pub fn location_attribute() -> Attribute {
    Attribute::required_enum(LOCATIONS)
        .with_description("Location to deploy to, e.g. us_east_1")
        .with_force_new()
}

/// Per-cloud deployment status reported by the remote service.
pub fn resource_status_attribute() -> Attribute {
    Attribute::new(
        AttributeType::map(AttributeType::String),
        AttributeFlags::computed(),
    )
    .with_description("Deployment status per cloud, set when the resource drifted")
    .with_plan_modifier(ResourceStatusAlwaysNull)
}

/// An optional integer list, e.g. availability zones.
pub fn optional_int64_list() -> Attribute {
    Attribute::new(
        AttributeType::list(AttributeType::Int64),
        AttributeFlags::optional(),
    )
}

/// An optional string map, e.g. labels.
pub fn optional_string_map() -> Attribute {
    Attribute::new(
        AttributeType::map(AttributeType::String),
        AttributeFlags::optional(),
    )
}

/// Add `id` to a schema.
pub fn with_id(schema: Schema) -> Schema {
    schema.with_attribute("id", id_attribute())
}

/// Add `id`, `cloud`, `location` and `resource_status` to a schema.
pub fn with_common(schema: Schema) -> Schema {
    with_id(schema)
        .with_attribute("cloud", cloud_attribute())
        .with_attribute("location", location_attribute())
        .with_attribute("resource_status", resource_status_attribute())
}

/// The arguments shared by kinds that are placed in a cloud and location.
pub fn common_args(
    cloud: &EnumValue<CloudProvider>,
    location: &EnumValue<Location>,
) -> Option<ResourceCommonArgs> {
    Some(ResourceCommonArgs {
        resource_group_id: String::new(),
        location: location.tag(),
        cloud_provider: cloud.tag(),
    })
}

/// The parts of `CommonResourceParameters` that records keep.
#[derive(Debug, Clone, Default)]
pub struct Common {
    /// Resource id.
    pub id: StringValue,
    /// Cloud, null when the service did not say.
    pub cloud: EnumValue<CloudProvider>,
    /// Location, null when the service did not say.
    pub location: EnumValue<Location>,
    /// Status map, null when empty.
    pub resource_status: MapValue<String>,
}

impl Common {
    /// Pull the shared fields out of a reply.
    pub fn from_params(params: Option<CommonResourceParameters>) -> Self {
        let Some(params) = params else {
            return Self::default();
        };
        Self {
            id: StringValue::from_non_zero(params.resource_id),
            cloud: EnumValue::from_remote(params.cloud_provider, &CLOUDS),
            location: EnumValue::from_remote(params.location, &LOCATIONS),
            resource_status: status_map(params.resource_status.map(|s| s.statuses)),
        }
    }
}

fn status_map(statuses: Option<HashMap<String, String>>) -> MapValue<String> {
    match statuses {
        Some(statuses) if !statuses.is_empty() => AttrValue::Known(statuses.into_iter().collect()),
        _ => AttrValue::Null,
    }
}

/// An integer attribute as an `int32` wire field, saturating at the bounds.
pub fn to_i32(value: &Int64Value) -> i32 {
    saturate(value.value_or_default())
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// A list of integers as `repeated int32`.
pub fn to_i32_list(values: &AttrValue<Vec<i64>>) -> Vec<i32> {
    values
        .value_or_default()
        .into_iter()
        .map(saturate)
        .collect()
}

/// `repeated int32` as an optional integer list.
pub fn from_i32_list(values: Vec<i32>) -> AttrValue<Vec<i64>> {
    AttrValue::from_non_zero(values.into_iter().map(i64::from).collect())
}

/// A string map attribute as a protobuf map.
pub fn to_proto_map(values: &MapValue<String>) -> HashMap<String, String> {
    values.value_or_default().into_iter().collect()
}

/// A protobuf map as an optional string map attribute.
pub fn from_proto_map(values: HashMap<String, String>) -> MapValue<String> {
    AttrValue::from_non_zero(values.into_iter().collect::<BTreeMap<_, _>>())
}
