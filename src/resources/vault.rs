//! Secret vaults, their access policies and secrets.

use serde::{Deserialize, Serialize};

use super::common::{common_args, name_attribute, with_common, with_id, Common};
use super::Wire;
use crate::enums::{CloudProvider, EnumType, EnumValue, Location, VaultAccess};
use crate::generated::resources::{
    CreateVaultAccessPolicyRequest, CreateVaultRequest, CreateVaultSecretRequest,
    UpdateVaultAccessPolicyRequest, UpdateVaultRequest, UpdateVaultSecretRequest,
    VaultAccessPolicyArgs, VaultAccessPolicyResource, VaultArgs, VaultResource, VaultSecretArgs,
    VaultSecretResource,
};
use crate::resource::Record;
use crate::schema::{Attribute, Schema};
use crate::value::{AttrValue, MapValue, StringValue};

/// Access levels of a policy.
pub const ACCESS_LEVELS: EnumType<VaultAccess> = EnumType::new();

/// State of a `vault`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vault {
    /// Resource id.
    pub id: StringValue,
    /// Vault name.
    pub name: StringValue,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for Vault {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for Vault {
    type Args = VaultArgs;
    type Reply = VaultResource;

    fn to_args(&self) -> VaultArgs {
        VaultArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
        }
    }

    fn from_reply(reply: VaultResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            cloud: common.cloud,
            location: common.location,
            resource_status: common.resource_status,
        }
    }
}

/// Schema of `vault`.
pub fn vault_schema() -> Schema {
    with_common(Schema::v0().with_description("A secret vault"))
        .with_attribute("name", name_attribute().with_force_new())
}

remote_resource! {
    /// Remote operations of `vault`.
    VaultCodec for Vault {
        type_name: "vault",
        kind: "Vault",
        schema: vault_schema,
        create: CreateVaultRequest,
        update: UpdateVaultRequest,
    }
}

/// State of a `vault_access_policy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultAccessPolicy {
    /// Resource id.
    pub id: StringValue,
    /// Vault the policy applies to.
    pub vault_id: StringValue,
    /// Identity granted access, usually a machine's `identity`.
    pub identity: StringValue,
    /// Granted access level.
    pub access: EnumValue<VaultAccess>,
}

impl Record for VaultAccessPolicy {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for VaultAccessPolicy {
    type Args = VaultAccessPolicyArgs;
    type Reply = VaultAccessPolicyResource;

    fn to_args(&self) -> VaultAccessPolicyArgs {
        VaultAccessPolicyArgs {
            vault_id: self.vault_id.value_or_default(),
            identity: self.identity.value_or_default(),
            access: self.access.tag(),
        }
    }

    fn from_reply(reply: VaultAccessPolicyResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            vault_id: AttrValue::Known(reply.vault_id),
            identity: AttrValue::Known(reply.identity),
            access: EnumValue::from_remote(reply.access, &ACCESS_LEVELS),
        }
    }
}

/// Schema of `vault_access_policy`.
pub fn vault_access_policy_schema() -> Schema {
    with_id(Schema::v0().with_description("Grants an identity access to a vault"))
        .with_attribute("vault_id", Attribute::required_string().with_force_new())
        .with_attribute("identity", Attribute::required_string().with_force_new())
        .with_attribute(
            "access",
            Attribute::required_enum(ACCESS_LEVELS).with_description("read, write or owner"),
        )
}

remote_resource! {
    /// Remote operations of `vault_access_policy`.
    VaultAccessPolicyCodec for VaultAccessPolicy {
        type_name: "vault_access_policy",
        kind: "VaultAccessPolicy",
        schema: vault_access_policy_schema,
        create: CreateVaultAccessPolicyRequest,
        update: UpdateVaultAccessPolicyRequest,
    }
}

/// State of a `vault_secret`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSecret {
    /// Resource id.
    pub id: StringValue,
    /// Secret name.
    pub name: StringValue,
    /// Secret value.
    pub value: StringValue,
    /// Vault holding the secret.
    pub vault_id: StringValue,
}

impl Record for VaultSecret {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for VaultSecret {
    type Args = VaultSecretArgs;
    type Reply = VaultSecretResource;

    fn to_args(&self) -> VaultSecretArgs {
        VaultSecretArgs {
            name: self.name.value_or_default(),
            value: self.value.value_or_default(),
            vault_id: self.vault_id.value_or_default(),
        }
    }

    fn from_reply(reply: VaultSecretResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            name: AttrValue::Known(reply.name),
            value: AttrValue::from_non_zero(reply.value),
            vault_id: AttrValue::Known(reply.vault_id),
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        if self.value.is_null() {
            self.value = sent.value.clone();
        }
    }
}

/// Schema of `vault_secret`.
pub fn vault_secret_schema() -> Schema {
    with_id(Schema::v0().with_description("A secret stored in a vault"))
        .with_attribute("name", name_attribute().with_force_new())
        .with_attribute("value", Attribute::required_string().sensitive())
        .with_attribute("vault_id", Attribute::required_string().with_force_new())
}

remote_resource! {
    /// Remote operations of `vault_secret`.
    VaultSecretCodec for VaultSecret {
        type_name: "vault_secret",
        kind: "VaultSecret",
        schema: vault_secret_schema,
        create: CreateVaultSecretRequest,
        update: UpdateVaultSecretRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_access_levels() {
        let schema = vault_access_policy_schema();
        let config = json!({"vault_id": "v-1", "identity": "vm-identity", "access": "owner"});
        assert!(validate(&schema, &config).is_empty());

        let policy: VaultAccessPolicy = serde_json::from_value(config).unwrap();
        assert_eq!(policy.to_args().access, VaultAccess::Owner as i32);

        let diagnostics = validate(
            &schema,
            &json!({"vault_id": "v-1", "identity": "vm-identity", "access": "admin"}),
        );
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("access"));
    }

    #[test]
    fn test_secret_value_is_sensitive_and_retained() {
        let schema = vault_secret_schema();
        assert!(schema.block.attributes["value"].flags.sensitive);
        assert!(schema.block.attributes["vault_id"].force_new);

        let sent = VaultSecret {
            name: AttrValue::known("api-key"),
            value: AttrValue::known("s3cr3t"),
            vault_id: AttrValue::known("v-1"),
            ..Default::default()
        };
        let mut state = VaultSecret::from_reply(VaultSecretResource {
            name: "api-key".to_string(),
            vault_id: "v-1".to_string(),
            ..Default::default()
        });
        state.retain_from(&sent);
        assert_eq!(state.value, sent.value);
    }

    #[test]
    fn test_vault_round_trip() {
        let vault: Vault = serde_json::from_value(json!({
            "name": "secrets",
            "cloud": "azure",
            "location": "eu_west_2",
        }))
        .unwrap();
        let args = vault.to_args();
        let common = args.common_parameters.unwrap();
        assert_eq!(common.cloud_provider, CloudProvider::Azure as i32);
        assert_eq!(common.location, Location::EuWest2 as i32);
        assert!(vault_schema().block.attributes["name"].force_new);
    }
}
