//! Object storage buckets and objects.

use serde::{Deserialize, Serialize};

use super::common::{common_args, name_attribute, with_common, with_id, Common};
use super::Wire;
use crate::enums::{CloudProvider, EnumType, EnumValue, Location, ObjectAcl};
use crate::generated::resources::{
    CreateObjectStorageObjectRequest, CreateObjectStorageRequest, ObjectStorageArgs,
    ObjectStorageObjectArgs, ObjectStorageObjectResource, ObjectStorageResource,
    UpdateObjectStorageObjectRequest, UpdateObjectStorageRequest,
};
use crate::planmodifiers::UsePriorStateForUnknown;
use crate::resource::Record;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::validators::EnumValidator;
use crate::value::{AttrValue, BoolValue, MapValue, StringValue};

/// Object ACLs; `private` is the zero tag.
pub const OBJECT_ACLS: EnumType<ObjectAcl> = EnumType::allowing_zero();

/// State of an `object_storage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorage {
    /// Resource id.
    pub id: StringValue,
    /// Bucket name.
    pub name: StringValue,
    /// Keep object versions.
    pub versioning: BoolValue,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for ObjectStorage {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for ObjectStorage {
    type Args = ObjectStorageArgs;
    type Reply = ObjectStorageResource;

    fn to_args(&self) -> ObjectStorageArgs {
        ObjectStorageArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            versioning: self.versioning.value_or_default(),
        }
    }

    fn from_reply(reply: ObjectStorageResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            versioning: AttrValue::from_non_zero(reply.versioning),
            cloud: common.cloud,
            location: common.location,
            resource_status: common.resource_status,
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.versioning.keep_zero_from(&sent.versioning);
    }
}

/// Schema of `object_storage`.
pub fn object_storage_schema() -> Schema {
    with_common(Schema::v0().with_description("A storage bucket"))
        .with_attribute(
            "name",
            name_attribute()
                .with_description("Globally unique bucket name")
                .with_force_new(),
        )
        .with_attribute("versioning", Attribute::optional_bool())
}

remote_resource! {
    /// Remote operations of `object_storage`.
    ObjectStorageCodec for ObjectStorage {
        type_name: "object_storage",
        kind: "ObjectStorage",
        schema: object_storage_schema,
        create: CreateObjectStorageRequest,
        update: UpdateObjectStorageRequest,
    }
}

/// State of an `object_storage_object`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageObject {
    /// Resource id.
    pub id: StringValue,
    /// Object key.
    pub name: StringValue,
    /// Bucket holding the object.
    pub object_storage_id: StringValue,
    /// Base64 content.
    pub content_base64: StringValue,
    /// MIME type.
    pub content_type: StringValue,
    /// Access level; the service defaults to private.
    pub acl: EnumValue<ObjectAcl>,
    /// Public URL of the object.
    pub url: StringValue,
}

impl Record for ObjectStorageObject {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for ObjectStorageObject {
    type Args = ObjectStorageObjectArgs;
    type Reply = ObjectStorageObjectResource;

    fn to_args(&self) -> ObjectStorageObjectArgs {
        ObjectStorageObjectArgs {
            name: self.name.value_or_default(),
            object_storage_id: self.object_storage_id.value_or_default(),
            content_base64: self.content_base64.value_or_default(),
            content_type: self.content_type.value_or_default(),
            acl: self.acl.tag(),
        }
    }

    fn from_reply(reply: ObjectStorageObjectResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            name: AttrValue::Known(reply.name),
            object_storage_id: AttrValue::Known(reply.object_storage_id),
            content_base64: AttrValue::from_non_zero(reply.content_base64),
            content_type: AttrValue::from_non_zero(reply.content_type),
            acl: EnumValue::from_remote(reply.acl, &OBJECT_ACLS),
            url: AttrValue::from_non_zero(reply.url),
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.content_base64.keep_zero_from(&sent.content_base64);
        self.content_type.keep_zero_from(&sent.content_type);
    }
}

/// Schema of `object_storage_object`.
pub fn object_storage_object_schema() -> Schema {
    with_id(Schema::v0().with_description("An object inside a bucket"))
        .with_attribute("name", name_attribute().with_force_new())
        .with_attribute(
            "object_storage_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute("content_base64", Attribute::optional_string())
        .with_attribute(
            "content_type",
            Attribute::optional_string().with_description("MIME type, e.g. text/html"),
        )
        .with_attribute(
            "acl",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_description("private or public_read")
                .with_validator(EnumValidator::new(OBJECT_ACLS))
                .with_plan_modifier(UsePriorStateForUnknown),
        )
        .with_attribute("url", Attribute::computed_string())
}

remote_resource! {
    /// Remote operations of `object_storage_object`.
    ObjectStorageObjectCodec for ObjectStorageObject {
        type_name: "object_storage_object",
        kind: "ObjectStorageObject",
        schema: object_storage_object_schema,
        create: CreateObjectStorageObjectRequest,
        update: UpdateObjectStorageObjectRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DynResource, ResourceAdapter};
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_private_acl_round_trips_as_zero() {
        let object: ObjectStorageObject = serde_json::from_value(json!({
            "name": "index.html",
            "object_storage_id": "bucket-1",
            "content_base64": "PGgxPmhpPC9oMT4=",
            "acl": "private",
        }))
        .unwrap();
        let args = object.to_args();
        assert_eq!(args.acl, 0);

        let state = ObjectStorageObject::from_reply(ObjectStorageObjectResource {
            name: args.name,
            object_storage_id: args.object_storage_id,
            content_base64: args.content_base64,
            acl: args.acl,
            url: "https://bucket-1/index.html".to_string(),
            ..Default::default()
        });
        assert_eq!(state.acl, object.acl);
        assert!(state.content_type.is_null());
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["acl"], "private");
        assert_eq!(value["url"], "https://bucket-1/index.html");
    }

    #[test]
    fn test_versioning_false_survives_reply() {
        let sent: ObjectStorage = serde_json::from_value(json!({
            "name": "assets",
            "versioning": false,
            "cloud": "aws",
            "location": "us_east_1",
        }))
        .unwrap();
        let args = sent.to_args();
        let mut state = ObjectStorage::from_reply(ObjectStorageResource {
            name: args.name,
            versioning: args.versioning,
            ..Default::default()
        });
        state.retain_from(&sent);
        assert_eq!(state.versioning, AttrValue::Known(false));

        let unset = ObjectStorage {
            versioning: AttrValue::Null,
            ..sent
        };
        let mut state = ObjectStorage::from_reply(ObjectStorageResource::default());
        state.retain_from(&unset);
        assert!(state.versioning.is_null());
    }

    #[test]
    fn test_acl_validation() {
        let schema = object_storage_object_schema();
        let base = json!({"name": "o", "object_storage_id": "b"});
        assert!(validate(&schema, &base).is_empty());

        let mut config = base.clone();
        config["acl"] = json!("public_read");
        assert!(validate(&schema, &config).is_empty());

        config["acl"] = json!("world_writable");
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("acl"));
    }

    #[test]
    fn test_unset_acl_keeps_prior_value() {
        let adapter = ResourceAdapter::new(ObjectStorageObjectCodec);
        let prior = json!({
            "id": "obj-1",
            "name": "o",
            "object_storage_id": "b",
            "acl": "private",
            "url": "https://b/o",
        });
        let config = json!({"name": "o", "object_storage_id": "b"});
        let plan = adapter
            .modify_plan(Some(prior), config.clone(), config)
            .unwrap();
        assert_eq!(plan.planned_state["acl"], "private");
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_bucket_name_forces_replacement() {
        let schema = object_storage_schema();
        assert!(schema.block.attributes["name"].force_new);
        assert!(!schema.block.attributes["versioning"].force_new);
    }
}
