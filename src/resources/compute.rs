//! Virtual machines.

use serde::{Deserialize, Serialize};

use super::common::{common_args, name_attribute, to_i32, with_common, Common};
use super::Wire;
use crate::enums::{CloudProvider, EnumType, EnumValue, Location, OperatingSystem, VmSize};
use crate::generated::resources::{
    CreateVirtualMachineRequest, ImageReference, UpdateVirtualMachineRequest, VirtualMachineArgs,
    VirtualMachineAwsOverride, VirtualMachineAzureOverride, VirtualMachineResource,
};
use crate::planmodifiers::DiffSuppress;
use crate::resource::Record;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validators::InRange;
use crate::value::{block_or_none, AttrValue, BoolValue, Int64Value, ListValue, MapValue, StringValue};

/// Generic machine sizes.
pub const VM_SIZES: EnumType<VmSize> = EnumType::new();

/// Operating systems of an image reference.
pub const OPERATING_SYSTEMS: EnumType<OperatingSystem> = EnumType::new();

/// The image a machine boots from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRef {
    /// Operating system.
    pub os: EnumValue<OperatingSystem>,
    /// OS version, e.g. `18.04`.
    pub version: StringValue,
}

/// AWS-only settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsOverrides {
    /// Instance type used instead of the generic size.
    pub instance_type: StringValue,
}

/// Azure-only settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureOverrides {
    /// VM size used instead of the generic size.
    pub size: StringValue,
}

/// State of a `virtual_machine`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualMachine {
    /// Resource id.
    pub id: StringValue,
    /// Machine name.
    pub name: StringValue,
    /// Generic size.
    pub size: EnumValue<VmSize>,
    /// Subnet of the primary interface.
    pub subnet_id: StringValue,
    /// Extra interfaces.
    pub network_interface_ids: ListValue<String>,
    /// Security groups of the primary interface.
    pub network_security_group_ids: ListValue<String>,
    /// Base64 cloud-init data.
    pub user_data_base64: StringValue,
    /// SSH public key.
    pub public_ssh_key: StringValue,
    /// Whether the service allocates a public address.
    pub public_ip: BoolValue,
    /// An existing public IP to attach instead.
    pub public_ip_id: StringValue,
    /// Boot image.
    #[serde(deserialize_with = "block_or_none")]
    pub image_reference: Option<ImageRef>,
    /// Availability zone index.
    pub availability_zone: Int64Value,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// AWS overrides.
    #[serde(deserialize_with = "block_or_none")]
    pub aws_overrides: Option<AwsOverrides>,
    /// Azure overrides.
    #[serde(deserialize_with = "block_or_none")]
    pub azure_overrides: Option<AzureOverrides>,
    /// Address allocated when `public_ip` is set.
    pub public_ip_address: StringValue,
    /// Managed identity of the machine.
    pub identity: StringValue,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for VirtualMachine {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }

    fn validate_config(&self) -> Vec<Diagnostic> {
        let generate = matches!(self.public_ip, AttrValue::Known(true));
        if generate && !self.public_ip_id.is_null() {
            return vec![Diagnostic::error("cannot set both public_ip and public_ip_id")
                .with_detail("Either let the service allocate an address or attach an existing one")
                .with_attribute("public_ip_id")];
        }
        Vec::new()
    }
}

impl Wire for VirtualMachine {
    type Args = VirtualMachineArgs;
    type Reply = VirtualMachineResource;

    fn to_args(&self) -> VirtualMachineArgs {
        VirtualMachineArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            network_interface_ids: self.network_interface_ids.value_or_default(),
            network_security_group_ids: self.network_security_group_ids.value_or_default(),
            vm_size: self.size.tag(),
            user_data_base64: self.user_data_base64.value_or_default(),
            subnet_id: self.subnet_id.value_or_default(),
            public_ssh_key: self.public_ssh_key.value_or_default(),
            public_ip_id: self.public_ip_id.value_or_default(),
            generate_public_ip: self.public_ip.value_or_default(),
            image_reference: self.image_reference.as_ref().map(|i| ImageReference {
                os: i.os.tag(),
                version: i.version.value_or_default(),
            }),
            availability_zone: to_i32(&self.availability_zone),
            aws_override: self.aws_overrides.as_ref().map(|o| VirtualMachineAwsOverride {
                instance_type: o.instance_type.value_or_default(),
            }),
            azure_override: self
                .azure_overrides
                .as_ref()
                .map(|o| VirtualMachineAzureOverride {
                    size: o.size.value_or_default(),
                }),
        }
    }

    fn from_reply(reply: VirtualMachineResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            size: EnumValue::from_remote(reply.vm_size, &VM_SIZES),
            subnet_id: AttrValue::Known(reply.subnet_id),
            network_interface_ids: AttrValue::from_non_zero(reply.network_interface_ids),
            network_security_group_ids: AttrValue::from_non_zero(reply.network_security_group_ids),
            user_data_base64: AttrValue::from_non_zero(reply.user_data_base64),
            public_ssh_key: AttrValue::from_non_zero(reply.public_ssh_key),
            public_ip: AttrValue::from_non_zero(reply.generate_public_ip),
            public_ip_id: AttrValue::from_non_zero(reply.public_ip_id),
            image_reference: reply.image_reference.map(|i| ImageRef {
                os: EnumValue::from_remote(i.os, &OPERATING_SYSTEMS),
                version: AttrValue::Known(i.version),
            }),
            availability_zone: AttrValue::from_non_zero(i64::from(reply.availability_zone)),
            cloud: common.cloud,
            location: common.location,
            aws_overrides: reply
                .aws_override
                .filter(|o| !o.instance_type.is_empty())
                .map(|o| AwsOverrides {
                    instance_type: AttrValue::Known(o.instance_type),
                }),
            azure_overrides: reply
                .azure_override
                .filter(|o| !o.size.is_empty())
                .map(|o| AzureOverrides {
                    size: AttrValue::Known(o.size),
                }),
            public_ip_address: AttrValue::from_non_zero(reply.public_ip),
            identity: AttrValue::from_non_zero(reply.identity_id),
            resource_status: common.resource_status,
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.network_interface_ids.keep_zero_from(&sent.network_interface_ids);
        self.network_security_group_ids.keep_zero_from(&sent.network_security_group_ids);
        self.user_data_base64.keep_zero_from(&sent.user_data_base64);
        self.public_ssh_key.keep_zero_from(&sent.public_ssh_key);
        self.public_ip.keep_zero_from(&sent.public_ip);
        self.public_ip_id.keep_zero_from(&sent.public_ip_id);
        self.availability_zone.keep_zero_from(&sent.availability_zone);
    }
}

/// Schema of `virtual_machine`.
pub fn virtual_machine_schema() -> Schema {
    let image = Block::new()
        .with_description("Image to boot from")
        .with_attribute(
            "os",
            Attribute::required_enum(OPERATING_SYSTEMS).with_force_new(),
        )
        .with_attribute("version", Attribute::required_string().with_force_new());

    with_common(Schema::v0().with_description("A virtual machine"))
        .with_attribute("name", name_attribute())
        .with_attribute("size", Attribute::required_enum(VM_SIZES))
        .with_attribute("subnet_id", Attribute::required_string().with_force_new())
        .with_attribute("network_interface_ids", Attribute::optional_string_list())
        .with_attribute("network_security_group_ids", Attribute::optional_string_list())
        .with_attribute(
            "user_data_base64",
            Attribute::optional_string()
                .with_description("Base64-encoded cloud-init data")
                .with_force_new(),
        )
        .with_attribute(
            "public_ssh_key",
            Attribute::optional_string()
                .with_description("Public key for SSH access")
                .with_plan_modifier(DiffSuppress::trimmed_whitespace())
                .with_force_new(),
        )
        .with_attribute(
            "public_ip",
            Attribute::optional_bool().with_description("Allocate a public address"),
        )
        .with_attribute(
            "public_ip_id",
            Attribute::optional_string().with_description("Existing public IP to attach"),
        )
        .with_attribute(
            "availability_zone",
            Attribute::optional_int64().with_validator(InRange::int32()),
        )
        .with_attribute("public_ip_address", Attribute::computed_string())
        .with_attribute("identity", Attribute::computed_string())
        .with_block("image_reference", NestedBlock::single(image))
        .with_block(
            "aws_overrides",
            NestedBlock::single(
                Block::new().with_attribute("instance_type", Attribute::optional_string()),
            ),
        )
        .with_block(
            "azure_overrides",
            NestedBlock::single(Block::new().with_attribute("size", Attribute::optional_string())),
        )
}

remote_resource! {
    /// Remote operations of `virtual_machine`.
    VirtualMachineCodec for VirtualMachine {
        type_name: "virtual_machine",
        kind: "VirtualMachine",
        schema: virtual_machine_schema,
        create: CreateVirtualMachineRequest,
        update: UpdateVirtualMachineRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{validate_record, DynResource, ResourceAdapter};
    use crate::testing::{assert_plan_replaces, assert_plan_updates_in_place};
    use serde_json::json;

    fn config() -> serde_json::Value {
        json!({
            "name": "vm",
            "size": "general_micro",
            "subnet_id": "subnet-1",
            "public_ssh_key": "ssh-rsa AAAA",
            "cloud": "aws",
            "location": "us_east_1",
            "image_reference": {"os": "ubuntu", "version": "18.04"},
        })
    }

    #[test]
    fn test_public_ip_conflict() {
        let mut config = config();
        config["public_ip"] = json!(true);
        config["public_ip_id"] = json!("pip1");

        let diagnostics = validate_record::<VirtualMachine>(&virtual_machine_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "cannot set both public_ip and public_ip_id");

        config["public_ip"] = json!(false);
        assert!(validate_record::<VirtualMachine>(&virtual_machine_schema(), &config).is_empty());
    }

    #[test]
    fn test_ssh_key_whitespace_is_not_a_change() {
        let adapter = ResourceAdapter::new(VirtualMachineCodec);
        let mut prior = config();
        prior["id"] = json!("vm-1");

        let mut config = config();
        config["public_ssh_key"] = json!("ssh-rsa AAAA\n");
        let plan = adapter
            .modify_plan(Some(prior.clone()), config.clone(), config)
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_eq!(plan.planned_state["public_ssh_key"], "ssh-rsa AAAA");

        let mut config = self::config();
        config["public_ssh_key"] = json!("ssh-rsa BBBB");
        let plan = adapter.modify_plan(Some(prior), config.clone(), config).unwrap();
        assert_plan_replaces(&plan, "public_ssh_key");
    }

    #[test]
    fn test_image_change_forces_replacement() {
        let adapter = ResourceAdapter::new(VirtualMachineCodec);
        let mut prior = config();
        prior["id"] = json!("vm-1");

        let mut config = config();
        config["image_reference"]["version"] = json!("20.04");
        let plan = adapter.modify_plan(Some(prior), config.clone(), config).unwrap();
        assert_plan_replaces(&plan, "image_reference.version");
    }

    #[test]
    fn test_explicit_false_and_zero_survive_reply() {
        let mut config = config();
        config["public_ip"] = json!(false);
        config["availability_zone"] = json!(0);
        let sent: VirtualMachine = serde_json::from_value(config).unwrap();

        let args = sent.to_args();
        let mut state = VirtualMachine::from_reply(VirtualMachineResource {
            name: args.name,
            vm_size: args.vm_size,
            subnet_id: args.subnet_id,
            public_ssh_key: args.public_ssh_key,
            generate_public_ip: args.generate_public_ip,
            availability_zone: args.availability_zone,
            image_reference: args.image_reference,
            ..Default::default()
        });
        assert!(state.public_ip.is_null());
        state.retain_from(&sent);
        assert_eq!(state.public_ip, AttrValue::Known(false));
        assert_eq!(state.availability_zone, AttrValue::Known(0));
        assert!(state.public_ip_id.is_null());
        assert_eq!(state.public_ssh_key, sent.public_ssh_key);
    }

    #[test]
    fn test_wire_mapping() {
        let mut config = config();
        config["public_ip"] = json!(true);
        config["aws_overrides"] = json!({"instance_type": "t3.nano"});
        let record: VirtualMachine = serde_json::from_value(config).unwrap();

        let args = record.to_args();
        assert!(args.generate_public_ip);
        assert_eq!(args.vm_size, VmSize::GeneralMicro as i32);
        assert_eq!(args.image_reference.as_ref().unwrap().os, OperatingSystem::Ubuntu as i32);
        assert_eq!(args.aws_override.as_ref().unwrap().instance_type, "t3.nano");
        assert!(args.azure_override.is_none());

        let reply = VirtualMachineResource {
            common_parameters: None,
            name: args.name.clone(),
            vm_size: args.vm_size,
            subnet_id: args.subnet_id.clone(),
            public_ssh_key: args.public_ssh_key.clone(),
            generate_public_ip: true,
            image_reference: args.image_reference.clone(),
            aws_override: args.aws_override.clone(),
            public_ip: "52.1.1.1".to_string(),
            identity_id: "arn:role".to_string(),
            ..Default::default()
        };
        let state = VirtualMachine::from_reply(reply);
        assert_eq!(state.public_ip_address, AttrValue::Known("52.1.1.1".to_string()));
        assert_eq!(state.identity, AttrValue::Known("arn:role".to_string()));
        assert_eq!(state.size, record.size);
        assert_eq!(state.image_reference, record.image_reference);
        assert_eq!(state.aws_overrides, record.aws_overrides);
        assert!(state.network_interface_ids.is_null());
    }
}
