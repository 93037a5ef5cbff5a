//! Kubernetes clusters and their node pools.
//!
//! A cluster carries one default pool as a nested block; further pools are
//! separate `kubernetes_node_pool` resources pointing at the cluster. Both
//! share [`NodePool`] for the pool settings.

use serde::{Deserialize, Serialize};

use super::common::{
    common_args, from_i32_list, from_proto_map, name_attribute, optional_int64_list,
    optional_string_map, to_i32, to_i32_list, to_proto_map, with_common, with_id, Common,
};
use super::compute::VM_SIZES;
use super::Wire;
use crate::enums::{CloudProvider, EnumValue, Location, VmSize};
use crate::generated::resources::{
    CreateKubernetesClusterRequest, CreateKubernetesNodePoolRequest, KubernetesClusterArgs,
    KubernetesClusterResource, KubernetesNodePoolArgs, KubernetesNodePoolResource,
    UpdateKubernetesClusterRequest, UpdateKubernetesNodePoolRequest,
};
use crate::planmodifiers::UsePriorStateForUnknown;
use crate::resource::Record;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::validators::{Cidr, InRange};
use crate::value::{
    block_or_none, AttrValue, Int64Value, ListValue, MapValue, StringValue,
};

/// Settings of a node pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePool {
    /// Pool name.
    pub name: StringValue,
    /// Subnets the nodes are placed in.
    pub subnet_ids: ListValue<String>,
    /// Nodes at creation; defaults to `min_node_count`.
    pub starting_node_count: Int64Value,
    /// Autoscaling lower bound.
    pub min_node_count: Int64Value,
    /// Autoscaling upper bound.
    pub max_node_count: Int64Value,
    /// Node size.
    pub vm_size: EnumValue<VmSize>,
    /// Node disk size.
    pub disk_size_gb: Int64Value,
    /// Availability zone indexes.
    pub availability_zones: ListValue<i64>,
    /// Kubernetes node labels.
    pub labels: MapValue<String>,
}

impl NodePool {
    fn to_args(&self, cluster_id: String) -> KubernetesNodePoolArgs {
        KubernetesNodePoolArgs {
            name: self.name.value_or_default(),
            subnet_ids: self.subnet_ids.value_or_default(),
            starting_node_count: to_i32(&self.starting_node_count),
            min_node_count: to_i32(&self.min_node_count),
            max_node_count: to_i32(&self.max_node_count),
            vm_size: self.vm_size.tag(),
            disk_size_gb: self.disk_size_gb.value_or_default(),
            cluster_id,
            labels: to_proto_map(&self.labels),
            availability_zone: to_i32_list(&self.availability_zones),
        }
    }

    fn from_reply(reply: &mut KubernetesNodePoolResource) -> Self {
        Self {
            name: AttrValue::Known(std::mem::take(&mut reply.name)),
            subnet_ids: AttrValue::Known(std::mem::take(&mut reply.subnet_ids)),
            starting_node_count: AttrValue::Known(i64::from(reply.starting_node_count)),
            min_node_count: AttrValue::Known(i64::from(reply.min_node_count)),
            max_node_count: AttrValue::Known(i64::from(reply.max_node_count)),
            vm_size: EnumValue::from_remote(reply.vm_size, &VM_SIZES),
            disk_size_gb: AttrValue::from_non_zero(reply.disk_size_gb),
            availability_zones: from_i32_list(std::mem::take(&mut reply.availability_zone)),
            labels: from_proto_map(std::mem::take(&mut reply.labels)),
        }
    }

    fn keep_zeros_from(&mut self, sent: &NodePool) {
        self.disk_size_gb.keep_zero_from(&sent.disk_size_gb);
        self.availability_zones.keep_zero_from(&sent.availability_zones);
        self.labels.keep_zero_from(&sent.labels);
    }

    /// The pool with `starting_node_count` filled in from `min_node_count`
    /// when the configuration leaves it out.
    fn with_planned_start(&self, config: &NodePool) -> NodePool {
        let mut plan = self.clone();
        if config.starting_node_count.is_null() && self.min_node_count.is_known() {
            plan.starting_node_count = self.min_node_count.clone();
        }
        plan
    }
}

/// The attributes of a node pool, shared by the cluster's default pool block
/// and the `kubernetes_node_pool` resource.
pub fn node_pool_block() -> Block {
    Block::new()
        .with_attribute("name", name_attribute())
        .with_attribute(
            "subnet_ids",
            Attribute::required_string_list().with_force_new(),
        )
        .with_attribute(
            "starting_node_count",
            Attribute::optional_computed_int64()
                .with_description("Defaults to min_node_count")
                .with_validator(InRange::int32())
                .with_plan_modifier(UsePriorStateForUnknown),
        )
        .with_attribute(
            "min_node_count",
            Attribute::required_int64().with_validator(InRange::int32()),
        )
        .with_attribute(
            "max_node_count",
            Attribute::required_int64().with_validator(InRange::int32()),
        )
        .with_attribute("vm_size", Attribute::required_enum(VM_SIZES))
        .with_attribute(
            "disk_size_gb",
            Attribute::optional_computed_int64().with_plan_modifier(UsePriorStateForUnknown),
        )
        .with_attribute(
            "availability_zones",
            optional_int64_list().with_validator(InRange::int32()),
        )
        .with_attribute("labels", optional_string_map())
}

/// State of a `kubernetes_cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesCluster {
    /// Resource id.
    pub id: StringValue,
    /// Cluster name.
    pub name: StringValue,
    /// Network the cluster lives in.
    pub virtual_network_id: StringValue,
    /// Range for Kubernetes service addresses.
    pub service_cidr: StringValue,
    /// The pool created with the cluster.
    #[serde(deserialize_with = "block_or_none")]
    pub default_node_pool: Option<NodePool>,
    /// Cloud.
    pub cloud: EnumValue<CloudProvider>,
    /// Location.
    pub location: EnumValue<Location>,
    /// API server endpoint.
    pub endpoint: StringValue,
    /// Cluster CA certificate.
    pub ca_certificate: StringValue,
    /// Raw kubeconfig.
    pub kube_config_raw: StringValue,
    /// Deployment status.
    pub resource_status: MapValue<String>,
}

impl Record for KubernetesCluster {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn cloud(&self) -> Option<CloudProvider> {
        self.cloud.get()
    }

    fn update_plan(&self, config: &Self) -> Option<(Self, Vec<String>)> {
        let pool = self.default_node_pool.as_ref()?;
        let planned = pool.with_planned_start(&config.default_node_pool.clone().unwrap_or_default());
        if planned == *pool {
            return None;
        }
        let mut plan = self.clone();
        plan.default_node_pool = Some(planned);
        Some((plan, Vec::new()))
    }
}

impl Wire for KubernetesCluster {
    type Args = KubernetesClusterArgs;
    type Reply = KubernetesClusterResource;

    fn to_args(&self) -> KubernetesClusterArgs {
        KubernetesClusterArgs {
            common_parameters: common_args(&self.cloud, &self.location),
            name: self.name.value_or_default(),
            service_cidr: self.service_cidr.value_or_default(),
            virtual_network_id: self.virtual_network_id.value_or_default(),
            default_node_pool: self
                .default_node_pool
                .as_ref()
                .map(|pool| pool.to_args(String::new())),
        }
    }

    fn from_reply(reply: KubernetesClusterResource) -> Self {
        let common = Common::from_params(reply.common_parameters);
        Self {
            id: common.id,
            name: AttrValue::Known(reply.name),
            virtual_network_id: AttrValue::Known(reply.virtual_network_id),
            service_cidr: AttrValue::from_non_zero(reply.service_cidr),
            default_node_pool: reply
                .default_node_pool
                .map(|mut pool| NodePool::from_reply(&mut pool)),
            cloud: common.cloud,
            location: common.location,
            endpoint: AttrValue::from_non_zero(reply.endpoint),
            ca_certificate: AttrValue::from_non_zero(reply.ca_certificate),
            kube_config_raw: AttrValue::from_non_zero(reply.kube_config_raw),
            resource_status: common.resource_status,
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.service_cidr.keep_zero_from(&sent.service_cidr);
        if let (Some(pool), Some(sent)) = (&mut self.default_node_pool, &sent.default_node_pool) {
            pool.keep_zeros_from(sent);
        }
    }
}

/// Schema of `kubernetes_cluster`.
pub fn kubernetes_cluster_schema() -> Schema {
    with_common(Schema::v0().with_description("A managed Kubernetes cluster"))
        .with_attribute("name", name_attribute())
        .with_attribute(
            "virtual_network_id",
            Attribute::required_string().with_force_new(),
        )
        .with_attribute(
            "service_cidr",
            Attribute::optional_computed_string()
                .with_validator(Cidr)
                .with_force_new()
                .with_plan_modifier(UsePriorStateForUnknown),
        )
        .with_block(
            "default_node_pool",
            NestedBlock::single(node_pool_block().with_description("Pool created with the cluster"))
                .with_min_items(1),
        )
        .with_attribute("endpoint", Attribute::computed_string())
        .with_attribute("ca_certificate", Attribute::computed_string())
        .with_attribute("kube_config_raw", Attribute::computed_string().sensitive())
}

remote_resource! {
    /// Remote operations of `kubernetes_cluster`.
    KubernetesClusterCodec for KubernetesCluster {
        type_name: "kubernetes_cluster",
        kind: "KubernetesCluster",
        schema: kubernetes_cluster_schema,
        create: CreateKubernetesClusterRequest,
        update: UpdateKubernetesClusterRequest,
    }
}

/// State of a `kubernetes_node_pool`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesNodePool {
    /// Resource id.
    pub id: StringValue,
    /// Cluster the pool belongs to.
    pub cluster_id: StringValue,
    /// Pool settings.
    #[serde(flatten)]
    pub pool: NodePool,
}

impl Record for KubernetesNodePool {
    fn id(&self) -> &StringValue {
        &self.id
    }

    fn update_plan(&self, config: &Self) -> Option<(Self, Vec<String>)> {
        let planned = self.pool.with_planned_start(&config.pool);
        if planned == self.pool {
            return None;
        }
        let mut plan = self.clone();
        plan.pool = planned;
        Some((plan, Vec::new()))
    }
}

impl Wire for KubernetesNodePool {
    type Args = KubernetesNodePoolArgs;
    type Reply = KubernetesNodePoolResource;

    fn to_args(&self) -> KubernetesNodePoolArgs {
        self.pool.to_args(self.cluster_id.value_or_default())
    }

    fn from_reply(mut reply: KubernetesNodePoolResource) -> Self {
        Self {
            id: Common::from_params(reply.common_parameters.take()).id,
            cluster_id: AttrValue::Known(std::mem::take(&mut reply.cluster_id)),
            pool: NodePool::from_reply(&mut reply),
        }
    }

    fn retain_from(&mut self, sent: &Self) {
        self.pool.keep_zeros_from(&sent.pool);
    }
}

/// Schema of `kubernetes_node_pool`.
pub fn kubernetes_node_pool_schema() -> Schema {
    let schema = with_id(Schema::v0().with_description("An extra node pool of a cluster"))
        .with_attribute("cluster_id", Attribute::required_string().with_force_new());
    node_pool_block()
        .attributes
        .into_iter()
        .fold(schema, |schema, (name, attr)| schema.with_attribute(name, attr))
}

remote_resource! {
    /// Remote operations of `kubernetes_node_pool`.
    KubernetesNodePoolCodec for KubernetesNodePool {
        type_name: "kubernetes_node_pool",
        kind: "KubernetesNodePool",
        schema: kubernetes_node_pool_schema,
        create: CreateKubernetesNodePoolRequest,
        update: UpdateKubernetesNodePoolRequest,
    }
}
