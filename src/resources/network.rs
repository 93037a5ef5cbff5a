//! Networking: virtual networks, subnets, interfaces, security groups, public
//! IPs, route tables and the association kinds.

use serde::{Deserialize, Serialize};

use super::common::{common_args, name_attribute, to_i32, with_common, with_id, Common};
use super::Wire;
use crate::enums::{CloudProvider, EnumType, EnumValue, Location, RouteDestination, RuleDirection};
use crate::generated::resources::{
    CreateNetworkInterfaceRequest, CreateNetworkInterfaceSecurityGroupAssociationRequest,
    CreateNetworkSecurityGroupRequest, CreatePublicIpRequest, CreateRouteTableAssociationRequest,
    CreateRouteTableRequest, CreateSubnetRequest, CreateVirtualNetworkRequest,
    NetworkInterfaceArgs, NetworkInterfaceResource, NetworkInterfaceSecurityGroupAssociationArgs,
    NetworkInterfaceSecurityGroupAssociationResource, NetworkSecurityGroupArgs,
    NetworkSecurityGroupResource, NetworkSecurityRule, PortRange, PublicIpArgs, PublicIpResource,
    Route, RouteTableArgs, RouteTableAssociationArgs, RouteTableAssociationResource,
    RouteTableResource, SubnetArgs, SubnetResource, UpdateNetworkInterfaceRequest,
    UpdateNetworkInterfaceSecurityGroupAssociationRequest, UpdateNetworkSecurityGroupRequest,
    UpdatePublicIpRequest, UpdateRouteTableAssociationRequest, UpdateRouteTableRequest,
    UpdateSubnetRequest, UpdateVirtualNetworkRequest, VirtualNetworkArgs,
    VirtualNetworkGcpOverride, VirtualNetworkResource,
};
use crate::planmodifiers::RequiresReplaceIfCloudEquals;
use crate::resource::Record;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validators::{Cidr, InRange, OneOf};
use crate::value::{
    block_or_none, empty_as_null, null_as_empty, AttrValue, Int64Value, MapValue, StringValue,
};

/// Rule directions; `both` is the zero tag.
pub const RULE_DIRECTIONS: EnumType<RuleDirection> = EnumType::allowing_zero();

/// Route destinations.
pub const ROUTE_DESTINATIONS: EnumType<RouteDestination> = EnumType::new();

// ---------------------------------------------------------------------------
// virtual_network
// ---------------------------------------------------------------------------

/// GCP-only settings of a virtual network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetworkGcpOverrides {
    /// Project to create the network in.
    pub project: StringValue,
}

/// State of a `virtual_network`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetwork {
    /// Resource id.
    pub id: StringValue,
    /// Network name.
    pub name: StringValue,
    /// Address space.
    pub cidr_block: StringValue,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// GCP overrides.
    #[serde(deserialize_with = "block_or_none")]
    pub gcp_overrides: Option<VirtualNetworkGcpOverrides>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for VirtualNetwork {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for VirtualNetwork {
    type Args = VirtualNetworkArgs;
    type Reply = VirtualNetworkResource;

    fn to_args(&self) -> VirtualNetworkArgs {
        VirtualNetworkArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            cidr_block: self.cidr_block.value_or_default(),
            gcp_override: self
                .gcp_overrides
                .as_ref()
                .map(|o| VirtualNetworkGcpOverride {
                    project: o.project.value_or_default(),
                }),
        }
    }

    fn from_reply(reply: VirtualNetworkResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            cidr_block: AttrValue::Known(reply.cidr_block),
            cloud: common.cloud,
            location: common.location,
            gcp_overrides: reply
                .gcp_override
                .filter(|o| !o.project.is_empty())
                .map(|o| VirtualNetworkGcpOverrides {
                    project: AttrValue::Known(o.project),
                }),
            resource_status: common.resource_status,
        }
    }
}

/// Schema of `virtual_network`.
pub fn virtual_network_schema() -> Schema {
    with_common(Schema::v0().with_description("A private network in one cloud and location"))
        .with_attribute(
            "name",
            name_attribute()
                .with_description("Name of the network")
                .with_plan_modifier(RequiresReplaceIfCloudEquals::new("azure")),
        )
        .with_attribute(
            "cidr_block",
            Attribute::required_string()
                .with_description("CIDR block of the network")
                .with_validator(Cidr)
                .with_plan_modifier(RequiresReplaceIfCloudEquals::new("aws")),
        )
        .with_block(
            "gcp_overrides",
            NestedBlock::single(
                Block::new()
                    .with_description("GCP-specific settings")
                    .with_attribute(
                        "project",
                        Attribute::optional_string()
                            .with_description("Project to create the network in")
                            .with_force_new(),
                    ),
            ),
        )
}

remote_resource! {
    /// Remote operations of `virtual_network`.
    VirtualNetworkCodec for VirtualNetwork {
        type_name: "virtual_network",
        kind: "VirtualNetwork",
        schema: virtual_network_schema,
        create: CreateVirtualNetworkRequest,
        update: UpdateVirtualNetworkRequest,
    }
}

// ---------------------------------------------------------------------------
// subnet
// ---------------------------------------------------------------------------

/// State of a `subnet`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subnet {
    /// Resource id.
    pub id: StringValue,
    /// Subnet name.
    pub name: StringValue,
    /// Address range within the network.
    pub cidr_block: StringValue,
    /// Owning network.
    pub virtual_network_id: StringValue,
    /// Availability zone index.
    pub availability_zone: Int64Value,
}

impl Record for Subnet {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for Subnet {
    type Args = SubnetArgs;
    type Reply = SubnetResource;

    fn to_args(&self) -> SubnetArgs {
        SubnetArgs {
            name: self.name.value_or_default(),
            cidr_block: self.cidr_block.value_or_default(),
            virtual_network_id: self.virtual_network_id.value_or_default(),
            availability_zone: to_i32(&self.availability_zone),
        }
    }

    fn from_reply(reply: SubnetResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            name: AttrValue::Known(reply.name),
            cidr_block: AttrValue::Known(reply.cidr_block),
            virtual_network_id: AttrValue::Known(reply.virtual_network_id),
            availability_zone: AttrValue::from_non_zero(i64::from(reply.availability_zone)),
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.availability_zone.keep_zero_from(&sent.availability_zone);
    }
}

/// Schema of `subnet`.
pub fn subnet_schema() -> Schema {
    with_id(Schema::v0().with_description("An address range inside a virtual network"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "cidr_block",
            Attribute::required_string()
                .with_validator(Cidr)
                .with_force_new(),
        )
        .with_attribute(
            "virtual_network_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute(
            "availability_zone",
            Attribute::optional_int64()
                .with_description("Zone index within the location")
                .with_validator(InRange::int32()),
        )
}

remote_resource! {
    /// Remote operations of `subnet`.
    SubnetCodec for Subnet {
        type_name: "subnet",
        kind: "Subnet",
        schema: subnet_schema,
        create: CreateSubnetRequest,
        update: UpdateSubnetRequest,
    }
}

// ---------------------------------------------------------------------------
// network_interface
// ---------------------------------------------------------------------------

/// State of a `network_interface`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterface {
    /// Resource id.
    pub id: StringValue,
    /// Interface name.
    pub name: StringValue,
    /// Subnet the interface attaches to.
    pub subnet_id: StringValue,
    /// Public IP to associate.
    pub public_ip_id: StringValue,
    /// Availability zone index.
    pub availability_zone: Int64Value,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for NetworkInterface {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for NetworkInterface {
    type Args = NetworkInterfaceArgs;
    type Reply = NetworkInterfaceResource;

    fn to_args(&self) -> NetworkInterfaceArgs {
        NetworkInterfaceArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            subnet_id: self.subnet_id.value_or_default(),
            public_ip_id: self.public_ip_id.value_or_default(),
            availability_zone: to_i32(&self.availability_zone),
        }
    }

    fn from_reply(reply: NetworkInterfaceResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            subnet_id: AttrValue::Known(reply.subnet_id),
            public_ip_id: AttrValue::from_non_zero(reply.public_ip_id),
            availability_zone: AttrValue::from_non_zero(i64::from(reply.availability_zone)),
            cloud: common.cloud,
            location: common.location,
            resource_status: common.resource_status,
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.public_ip_id.keep_zero_from(&sent.public_ip_id);
        self.availability_zone.keep_zero_from(&sent.availability_zone);
    }
}

/// Schema of `network_interface`.
pub fn network_interface_schema() -> Schema {
    with_common(Schema::v0().with_description("A network interface in a subnet"))
        .with_attribute("name", name_attribute())
        .with_attribute("subnet_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "public_ip_id",
            Attribute::optional_string().with_description("Public IP to associate"),
        )
        .with_attribute(
            "availability_zone",
            Attribute::optional_int64()
                .with_validator(InRange::int32())
                .with_force_new(),
        )
}

remote_resource! {
    /// Remote operations of `network_interface`.
    NetworkInterfaceCodec for NetworkInterface {
        type_name: "network_interface",
        kind: "NetworkInterface",
        schema: network_interface_schema,
        create: CreateNetworkInterfaceRequest,
        update: UpdateNetworkInterfaceRequest,
    }
}

// ---------------------------------------------------------------------------
// network_security_group
// ---------------------------------------------------------------------------

/// One rule of a network security group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityRule {
    /// `tcp`, `udp` or `icmp`.
    pub protocol: StringValue,
    /// Evaluation priority.
    pub priority: Int64Value,
    /// First port of the range.
    pub from_port: Int64Value,
    /// Last port of the range.
    pub to_port: Int64Value,
    /// Source or destination range.
    pub cidr_block: StringValue,
    /// Traffic direction.
    pub direction: EnumValue<RuleDirection>,
}

impl SecurityRule {
    fn to_proto(&self) -> NetworkSecurityRule {
        NetworkSecurityRule {
            protocol: self.protocol.value_or_default(),
            priority: self.priority.value_or_default(),
            port_range: Some(PortRange {
                from: to_i32(&self.from_port),
                to: to_i32(&self.to_port),
            }),
            cidr_block: self.cidr_block.value_or_default(),
            direction: self.direction.tag(),
        }
    }

    fn from_proto(rule: NetworkSecurityRule) -> Self {
        let ports = rule.port_range.unwrap_or_default();
        Self {
            protocol: AttrValue::Known(rule.protocol),
            priority: AttrValue::Known(rule.priority),
            from_port: AttrValue::Known(i64::from(ports.from)),
            to_port: AttrValue::Known(i64::from(ports.to)),
            cidr_block: AttrValue::Known(rule.cidr_block),
            direction: EnumValue::from_remote(rule.direction, &RULE_DIRECTIONS),
        }
    }
}

/// State of a `network_security_group`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSecurityGroup {
    /// Resource id.
    pub id: StringValue,
    /// Group name.
    pub name: StringValue,
    /// Network the group belongs to.
    pub virtual_network_id: StringValue,
    /// Rules, in configuration order.
    #[serde(deserialize_with = "null_as_empty", serialize_with = "empty_as_null")]
    pub rule: Vec<SecurityRule>,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for NetworkSecurityGroup {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for NetworkSecurityGroup {
    type Args = NetworkSecurityGroupArgs;
    type Reply = NetworkSecurityGroupResource;

    fn to_args(&self) -> NetworkSecurityGroupArgs {
        NetworkSecurityGroupArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            virtual_network_id: self.virtual_network_id.value_or_default(),
            rules: self.rule.iter().map(SecurityRule::to_proto).collect(),
        }
    }

    fn from_reply(reply: NetworkSecurityGroupResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            virtual_network_id: AttrValue::Known(reply.virtual_network_id),
            rule: reply.rules.into_iter().map(SecurityRule::from_proto).collect(),
            cloud: common.cloud,
            location: common.location,
            resource_status: common.resource_status,
        }
    }
}

/// Schema of `network_security_group`.
pub fn network_security_group_schema() -> Schema {
    let rule = Block::new()
        .with_description("Traffic rule")
        .with_attribute(
            "protocol",
            Attribute::required_string().with_validator(OneOf::new(["tcp", "udp", "icmp"])),
        )
        .with_attribute("priority", Attribute::required_int64())
        .with_attribute(
            "from_port",
            Attribute::required_int64().with_validator(InRange::int32()),
        )
        .with_attribute(
            "to_port",
            Attribute::required_int64().with_validator(InRange::int32()),
        )
        .with_attribute(
            "cidr_block",
            Attribute::required_string().with_validator(Cidr),
        )
        .with_attribute(
            "direction",
            Attribute::required_enum(RULE_DIRECTIONS)
                .with_description("ingress, egress or both"),
        );

    with_common(Schema::v0().with_description("Firewall rules for a virtual network"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "virtual_network_id",
            Attribute::required_string().with_force_new(),
        )
        .with_block("rule", NestedBlock::list(rule))
}

remote_resource! {
    /// Remote operations of `network_security_group`.
    NetworkSecurityGroupCodec for NetworkSecurityGroup {
        type_name: "network_security_group",
        kind: "NetworkSecurityGroup",
        schema: network_security_group_schema,
        create: CreateNetworkSecurityGroupRequest,
        update: UpdateNetworkSecurityGroupRequest,
    }
}

// ---------------------------------------------------------------------------
// public_ip
// ---------------------------------------------------------------------------

/// State of a `public_ip`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicIp {
    /// Resource id.
    pub id: StringValue,
    /// Name.
    pub name: StringValue,
    /// Allocated address.
    pub ip: StringValue,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for PublicIp {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }
}

impl Wire for PublicIp {
    type Args = PublicIpArgs;
    type Reply = PublicIpResource;

    fn to_args(&self) -> PublicIpArgs {
        PublicIpArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
        }
    }

    fn from_reply(reply: PublicIpResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            ip: AttrValue::from_non_zero(reply.ip),
            cloud: common.cloud,
            location: common.location,
            resource_status: common.resource_status,
        }
    }
}

/// Schema of `public_ip`.
pub fn public_ip_schema() -> Schema {
    with_common(Schema::v0().with_description("A static public address"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "ip",
            Attribute::computed_string().with_description("The allocated address"),
        )
}

remote_resource! {
    /// Remote operations of `public_ip`.
    PublicIpCodec for PublicIp {
        type_name: "public_ip",
        kind: "PublicIp",
        schema: public_ip_schema,
        create: CreatePublicIpRequest,
        update: UpdatePublicIpRequest,
    }
}

// ---------------------------------------------------------------------------
// route_table
// ---------------------------------------------------------------------------

/// One route of a route table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteEntry {
    /// Destination range.
    pub cidr_block: StringValue,
    /// Where matching traffic goes.
    pub destination: EnumValue<RouteDestination>,
}

/// State of a `route_table`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    /// Resource id.
    pub id: StringValue,
    /// Name.
    pub name: StringValue,
    /// Network the table belongs to.
    pub virtual_network_id: StringValue,
    /// Routes.
    #[serde(deserialize_with = "null_as_empty", serialize_with = "empty_as_null")]
    pub route: Vec<RouteEntry>,
}

impl Record for RouteTable {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for RouteTable {
    type Args = RouteTableArgs;
    type Reply = RouteTableResource;

    fn to_args(&self) -> RouteTableArgs {
        RouteTableArgs {
            name: self.name.value_or_default(),
            virtual_network_id: self.virtual_network_id.value_or_default(),
            routes: self
                .route
                .iter()
                .map(|r| Route {
                    cidr_block: r.cidr_block.value_or_default(),
                    destination: r.destination.tag(),
                })
                .collect(),
        }
    }

    fn from_reply(reply: RouteTableResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            name: AttrValue::Known(reply.name),
            virtual_network_id: AttrValue::Known(reply.virtual_network_id),
            route: reply
                .routes
                .into_iter()
                .map(|r| RouteEntry {
                    cidr_block: AttrValue::Known(r.cidr_block),
                    destination: EnumValue::from_remote(r.destination, &ROUTE_DESTINATIONS),
                })
                .collect(),
        }
    }
}

/// Schema of `route_table`.
pub fn route_table_schema() -> Schema {
    with_id(Schema::v0().with_description("Routes for the subnets of a virtual network"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "virtual_network_id",
            Attribute::required_string().with_force_new(),
        )
        .with_block(
            "route",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "cidr_block",
                        Attribute::required_string().with_validator(Cidr),
                    )
                    .with_attribute(
                        "destination",
                        Attribute::required_enum(ROUTE_DESTINATIONS),
                    ),
            ),
        )
}

remote_resource! {
    /// Remote operations of `route_table`.
    RouteTableCodec for RouteTable {
        type_name: "route_table",
        kind: "RouteTable",
        schema: route_table_schema,
        create: CreateRouteTableRequest,
        update: UpdateRouteTableRequest,
    }
}

// ---------------------------------------------------------------------------
// route_table_association
// ---------------------------------------------------------------------------

/// State of a `route_table_association`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTableAssociation {
    /// Resource id.
    pub id: StringValue,
    /// Subnet to route.
    pub subnet_id: StringValue,
    /// Route table to apply.
    pub route_table_id: StringValue,
}

impl Record for RouteTableAssociation {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for RouteTableAssociation {
    type Args = RouteTableAssociationArgs;
    type Reply = RouteTableAssociationResource;

    fn to_args(&self) -> RouteTableAssociationArgs {
        RouteTableAssociationArgs {
            subnet_id: self.subnet_id.value_or_default(),
            route_table_id: self.route_table_id.value_or_default(),
        }
    }

    fn from_reply(reply: RouteTableAssociationResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            subnet_id: AttrValue::Known(reply.subnet_id),
            route_table_id: AttrValue::Known(reply.route_table_id),
        }
    }
}

/// Schema of `route_table_association`.
pub fn route_table_association_schema() -> Schema {
    with_id(Schema::v0().with_description("Applies a route table to a subnet"))
        .with_attribute("subnet_id", Attribute::required_string().with_force_new())
        .with_attribute(
            "route_table_id",
            Attribute::required_string().with_force_new(),
        )
}

remote_resource! {
    /// Remote operations of `route_table_association`.
    RouteTableAssociationCodec for RouteTableAssociation {
        type_name: "route_table_association",
        kind: "RouteTableAssociation",
        schema: route_table_association_schema,
        create: CreateRouteTableAssociationRequest,
        update: UpdateRouteTableAssociationRequest,
    }
}

// ---------------------------------------------------------------------------
// network_interface_security_group_association
// ---------------------------------------------------------------------------

/// State of a `network_interface_security_group_association`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkInterfaceSecurityGroupAssociation {
    /// Resource id.
    pub id: StringValue,
    /// Interface to protect.
    pub network_interface_id: StringValue,
    /// Group to apply.
    pub security_group_id: StringValue,
}

impl Record for NetworkInterfaceSecurityGroupAssociation {
    fn id(&self) -> &StringValue {
        &self.id
    }
}

impl Wire for NetworkInterfaceSecurityGroupAssociation {
    type Args = NetworkInterfaceSecurityGroupAssociationArgs;
    type Reply = NetworkInterfaceSecurityGroupAssociationResource;

    fn to_args(&self) -> NetworkInterfaceSecurityGroupAssociationArgs {
        NetworkInterfaceSecurityGroupAssociationArgs {
            network_interface_id: self.network_interface_id.value_or_default(),
            security_group_id: self.security_group_id.value_or_default(),
        }
    }

    fn from_reply(reply: NetworkInterfaceSecurityGroupAssociationResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters).id,
            network_interface_id: AttrValue::Known(reply.network_interface_id),
            security_group_id: AttrValue::Known(reply.security_group_id),
        }
    }
}

/// Schema of `network_interface_security_group_association`.
pub fn network_interface_security_group_association_schema() -> Schema {
    with_id(Schema::v0().with_description("Applies a security group to a network interface"))
        .with_attribute(
            "network_interface_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute(
            "security_group_id",
            Attribute::required_string().with_force_new(),
        )
}

remote_resource! {
    /// Remote operations of `network_interface_security_group_association`.
    NetworkInterfaceSecurityGroupAssociationCodec for NetworkInterfaceSecurityGroupAssociation {
        type_name: "network_interface_security_group_association",
        kind: "NetworkInterfaceSecurityGroupAssociation",
        schema: network_interface_security_group_association_schema,
        create: CreateNetworkInterfaceSecurityGroupAssociationRequest,
        update: UpdateNetworkInterfaceSecurityGroupAssociationRequest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{DynResource, ResourceAdapter};
    use crate::testing::assert_plan_replaces;
    use crate::validation::validate;
    use serde_json::json;

    fn vn_state(cloud: &str) -> serde_json::Value {
        json!({
            "id": "vn-1",
            "name": "vn1",
            "cidr_block": "10.0.0.0/16",
            "cloud": cloud,
            "location": "us_east_1",
        })
    }

    #[test]
    fn test_virtual_network_wire_round_trip() {
        let record: VirtualNetwork = serde_json::from_value(json!({
            "name": "vn1",
            "cidr_block": "10.0.0.0/16",
            "cloud": "gcp",
            "location": "eu_west_1",
            "gcp_overrides": {"project": "p1"},
        }))
        .unwrap();

        let args = record.to_args();
        let common = args.common_parameters.clone().unwrap();
        assert_eq!(common.cloud_provider, CloudProvider::Gcp as i32);
        assert_eq!(common.location, Location::EuWest1 as i32);
        assert_eq!(args.gcp_override.as_ref().unwrap().project, "p1");

        let reply = VirtualNetworkResource {
            common_parameters: Some(crate::generated::resources::CommonResourceParameters {
                resource_id: "vn-1".to_string(),
                cloud_provider: common.cloud_provider,
                location: common.location,
                ..Default::default()
            }),
            name: args.name,
            cidr_block: args.cidr_block,
            gcp_override: args.gcp_override,
        };
        let back = VirtualNetwork::from_reply(reply);
        assert_eq!(back.id, AttrValue::Known("vn-1".to_string()));
        assert_eq!(
            VirtualNetwork {
                id: record.id.clone(),
                ..back
            },
            record
        );
    }

    #[test]
    fn test_virtual_network_replacement_depends_on_cloud() {
        let adapter = ResourceAdapter::new(VirtualNetworkCodec);

        let config = json!({
            "name": "vn2",
            "cidr_block": "10.0.0.0/16",
            "cloud": "azure",
            "location": "us_east_1",
        });
        let plan = adapter
            .modify_plan(Some(vn_state("azure")), config.clone(), config)
            .unwrap();
        assert_plan_replaces(&plan, "name");
        assert_eq!(plan.planned_state["id"], "vn-1");

        let config = json!({
            "name": "vn2",
            "cidr_block": "10.0.0.0/16",
            "cloud": "aws",
            "location": "us_east_1",
        });
        let plan = adapter
            .modify_plan(Some(vn_state("aws")), config.clone(), config)
            .unwrap();
        assert!(!plan.requires_replace);

        let config = json!({
            "name": "vn1",
            "cidr_block": "10.1.0.0/16",
            "cloud": "aws",
            "location": "us_east_1",
        });
        let plan = adapter
            .modify_plan(Some(vn_state("aws")), config.clone(), config)
            .unwrap();
        assert_plan_replaces(&plan, "cidr_block");
    }

    #[test]
    fn test_virtual_network_validation() {
        let diagnostics = validate(
            &virtual_network_schema(),
            &json!({
                "name": "vn1",
                "cidr_block": "10.0.0.0",
                "cloud": "oracle",
                "location": "us_east_1",
            }),
        );
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attrs.contains(&"cidr_block"));
        assert!(attrs.contains(&"cloud"));
    }

    #[test]
    fn test_security_rule_keeps_both_ports() {
        let rule = SecurityRule {
            protocol: AttrValue::Known("tcp".to_string()),
            priority: AttrValue::Known(100),
            from_port: AttrValue::Known(8000),
            to_port: AttrValue::Known(8080),
            cidr_block: AttrValue::Known("0.0.0.0/0".to_string()),
            direction: EnumValue::parse("ingress"),
        };
        let proto = rule.to_proto();
        assert_eq!(proto.port_range, Some(PortRange { from: 8000, to: 8080 }));
        assert_eq!(proto.direction, RuleDirection::Ingress as i32);
        assert_eq!(SecurityRule::from_proto(proto), rule);
    }

    #[test]
    fn test_security_rule_direction_both_is_zero() {
        let rule = SecurityRule::from_proto(NetworkSecurityRule {
            protocol: "udp".to_string(),
            direction: 0,
            ..Default::default()
        });
        assert_eq!(rule.direction.get(), Some(RuleDirection::Both));
        assert_eq!(rule.direction.to_host(), json!("both"));
    }

    #[test]
    fn test_rule_validation_reaches_nested_blocks() {
        let diagnostics = validate(
            &network_security_group_schema(),
            &json!({
                "name": "nsg",
                "virtual_network_id": "vn-1",
                "cloud": "aws",
                "location": "us_east_1",
                "rule": [{
                    "protocol": "http",
                    "priority": 100,
                    "from_port": 80,
                    "to_port": 80,
                    "cidr_block": "0.0.0.0/0",
                    "direction": "sideways",
                }],
            }),
        );
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attrs.contains(&"rule.0.protocol"), "{:?}", attrs);
        assert!(attrs.contains(&"rule.0.direction"), "{:?}", attrs);
    }

    #[test]
    fn test_port_outside_int32_is_rejected() {
        let config = |from_port: i64| {
            json!({
                "name": "nsg",
                "virtual_network_id": "vn-1",
                "cloud": "aws",
                "location": "us_east_1",
                "rule": [{
                    "protocol": "tcp",
                    "priority": 100,
                    "from_port": from_port,
                    "to_port": 443,
                    "cidr_block": "0.0.0.0/0",
                    "direction": "ingress",
                }],
            })
        };
        let schema = network_security_group_schema();
        assert!(validate(&schema, &config(443)).is_empty());

        let diagnostics = validate(&schema, &config(2_147_483_648));
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["rule.0.from_port"]);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let diagnostics = validate(
            &subnet_schema(),
            &json!({
                "name": "",
                "cidr_block": "10.0.1.0/24",
                "virtual_network_id": "vn-1",
            }),
        );
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["name"]);
    }

    #[test]
    fn test_group_without_rules_serializes_null() {
        let group = NetworkSecurityGroup::from_reply(NetworkSecurityGroupResource {
            name: "nsg".to_string(),
            ..Default::default()
        });
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["rule"], json!(null));
    }

    #[test]
    fn test_optional_fields_collapse_to_null() {
        let subnet = Subnet::from_reply(SubnetResource {
            name: "s".to_string(),
            cidr_block: "10.0.1.0/24".to_string(),
            virtual_network_id: "vn-1".to_string(),
            ..Default::default()
        });
        assert!(subnet.availability_zone.is_null());
        assert!(subnet.id.is_null());

        let nic = NetworkInterface::from_reply(NetworkInterfaceResource::default());
        assert!(nic.public_ip_id.is_null());
        assert!(nic.cloud.is_null());
    }

    #[test]
    fn test_configured_zone_zero_survives_reply() {
        let sent: Subnet = serde_json::from_value(json!({
            "name": "s",
            "cidr_block": "10.0.1.0/24",
            "virtual_network_id": "vn-1",
            "availability_zone": 0,
        }))
        .unwrap();
        let mut subnet = Subnet::from_reply(SubnetResource {
            name: "s".to_string(),
            cidr_block: "10.0.1.0/24".to_string(),
            virtual_network_id: "vn-1".to_string(),
            availability_zone: sent.to_args().availability_zone,
            ..Default::default()
        });
        subnet.retain_from(&sent);
        assert_eq!(subnet.availability_zone, AttrValue::Known(0));

        let sent: NetworkInterface = serde_json::from_value(json!({
            "name": "nic",
            "subnet_id": "subnet-1",
            "availability_zone": 0,
        }))
        .unwrap();
        let mut nic = NetworkInterface::from_reply(NetworkInterfaceResource::default());
        nic.retain_from(&sent);
        assert_eq!(nic.availability_zone, AttrValue::Known(0));
        assert!(nic.public_ip_id.is_null());
    }

    #[test]
    fn test_route_table_round_trip() {
        let table: RouteTable = serde_json::from_value(json!({
            "name": "rt",
            "virtual_network_id": "vn-1",
            "route": [{"cidr_block": "0.0.0.0/0", "destination": "internet"}],
        }))
        .unwrap();
        let args = table.to_args();
        assert_eq!(args.routes[0].destination, RouteDestination::Internet as i32);

        let back = RouteTable::from_reply(RouteTableResource {
            common_parameters: None,
            name: args.name,
            virtual_network_id: args.virtual_network_id,
            routes: args.routes,
        });
        assert_eq!(back, table);
    }

    #[test]
    fn test_association_ids_force_replacement() {
        for schema in [
            route_table_association_schema(),
            network_interface_security_group_association_schema(),
        ] {
            for (name, attr) in &schema.block.attributes {
                if name != "id" {
                    assert!(attr.force_new, "{}", name);
                }
            }
        }
    }
}
