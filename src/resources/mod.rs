//! Resource kinds and data sources.
//!
//! Every kind is a typed record (its host-visible shape), a schema function
//! and a [`Wire`] impl converting the record to and from the remote messages.
//! The `remote_resource!` macro turns those into a [`ResourceCodec`] whose
//! four operations call `Create{Kind}`, `Read{Kind}`, `Update{Kind}` and
//! `Delete{Kind}`.
//!
//! [`ResourceCodec`]: crate::resource::ResourceCodec

use std::sync::Arc;

use crate::resource::{DynDataSource, DynResource, Record, ResourceAdapter};

/// Conversion between a record and the remote messages of its kind.
pub trait Wire: Record {
    /// The `{Kind}Args` message sent on create and update.
    type Args: Send;

    /// The `{Kind}Resource` message every operation but delete returns.
    type Reply: prost::Message + Default;

    /// Build the request payload.
    fn to_args(&self) -> Self::Args;

    /// Build a record from a reply.
    fn from_reply(reply: Self::Reply) -> Self;

    /// Copy values the service does not echo back (secrets) from the record
    /// that was sent. Empty by default.
    fn retain_from(&mut self, sent: &Self) {
        let _ = sent;
    }
}

/// Define a codec struct wired to the remote CRUD methods of one kind.
macro_rules! remote_resource {
    (
        $(#[$meta:meta])*
        $codec:ident for $record:ty {
            type_name: $type_name:literal,
            kind: $kind:literal,
            schema: $schema:path,
            create: $create:ident,
            update: $update:ident $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $codec;

        #[async_trait::async_trait]
        impl $crate::resource::ResourceCodec for $codec {
            type Model = $record;

            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn schema(&self) -> $crate::schema::Schema {
                $schema()
            }

            async fn create(
                &self,
                ctx: &$crate::context::ProviderContext,
                model: $record,
            ) -> Result<$record, $crate::error::ProviderError> {
                let request = $create {
                    resource: Some($crate::resources::Wire::to_args(&model)),
                };
                let reply = ctx
                    .call($crate::method!("Create", $kind), &request)
                    .await?;
                let mut state = <$record as $crate::resources::Wire>::from_reply(reply);
                $crate::resources::Wire::retain_from(&mut state, &model);
                Ok(state)
            }

            async fn read(
                &self,
                ctx: &$crate::context::ProviderContext,
                model: $record,
            ) -> Result<$record, $crate::error::ProviderError> {
                let request = $crate::generated::resources::ReadRequest {
                    resource_id: $crate::resource::Record::require_id(&model, "read")?,
                };
                let reply = ctx.call($crate::method!("Read", $kind), &request).await?;
                let mut state = <$record as $crate::resources::Wire>::from_reply(reply);
                $crate::resources::Wire::retain_from(&mut state, &model);
                Ok(state)
            }

            async fn update(
                &self,
                ctx: &$crate::context::ProviderContext,
                model: $record,
            ) -> Result<$record, $crate::error::ProviderError> {
                let request = $update {
                    resource_id: $crate::resource::Record::require_id(&model, "update")?,
                    resource: Some($crate::resources::Wire::to_args(&model)),
                };
                let reply = ctx
                    .call($crate::method!("Update", $kind), &request)
                    .await?;
                let mut state = <$record as $crate::resources::Wire>::from_reply(reply);
                $crate::resources::Wire::retain_from(&mut state, &model);
                Ok(state)
            }

            async fn delete(
                &self,
                ctx: &$crate::context::ProviderContext,
                model: $record,
            ) -> Result<(), $crate::error::ProviderError> {
                let request = $crate::generated::resources::DeleteRequest {
                    resource_id: $crate::resource::Record::require_id(&model, "delete")?,
                };
                let _: $crate::generated::resources::DeleteResponse = ctx
                    .call($crate::method!("Delete", $kind), &request)
                    .await?;
                Ok(())
            }
        }
    };
}

pub mod common;
pub mod compute;
pub mod data_sources;
pub mod database;
pub mod kubernetes;
pub mod network;
pub mod storage;
pub mod vault;

/// Every resource kind this provider serves.
pub fn all() -> Vec<Arc<dyn DynResource>> {
    vec![
        Arc::new(ResourceAdapter::new(network::VirtualNetworkCodec)),
        Arc::new(ResourceAdapter::new(network::SubnetCodec)),
        Arc::new(ResourceAdapter::new(network::NetworkInterfaceCodec)),
        Arc::new(ResourceAdapter::new(network::NetworkSecurityGroupCodec)),
        Arc::new(ResourceAdapter::new(network::PublicIpCodec)),
        Arc::new(ResourceAdapter::new(network::RouteTableCodec)),
        Arc::new(ResourceAdapter::new(network::RouteTableAssociationCodec)),
        Arc::new(ResourceAdapter::new(
            network::NetworkInterfaceSecurityGroupAssociationCodec,
        )),
        Arc::new(ResourceAdapter::new(compute::VirtualMachineCodec)),
        Arc::new(ResourceAdapter::new(storage::ObjectStorageCodec)),
        Arc::new(ResourceAdapter::new(storage::ObjectStorageObjectCodec)),
        Arc::new(ResourceAdapter::new(database::DatabaseCodec)),
        Arc::new(ResourceAdapter::new(kubernetes::KubernetesClusterCodec)),
        Arc::new(ResourceAdapter::new(kubernetes::KubernetesNodePoolCodec)),
        Arc::new(ResourceAdapter::new(vault::VaultCodec)),
        Arc::new(ResourceAdapter::new(vault::VaultAccessPolicyCodec)),
        Arc::new(ResourceAdapter::new(vault::VaultSecretCodec)),
    ]
}

/// Every data source this provider serves.
pub fn data_sources() -> Vec<Arc<dyn DynDataSource>> {
    vec![Arc::new(data_sources::VirtualNetworkDataSource)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use std::collections::BTreeSet;

    #[test]
    fn test_catalog() {
        let names: Vec<&str> = all().iter().map(|r| r.type_name()).collect();
        assert_eq!(
            names,
            vec![
                "virtual_network",
                "subnet",
                "network_interface",
                "network_security_group",
                "public_ip",
                "route_table",
                "route_table_association",
                "network_interface_security_group_association",
                "virtual_machine",
                "object_storage",
                "object_storage_object",
                "database",
                "kubernetes_cluster",
                "kubernetes_node_pool",
                "vault",
                "vault_access_policy",
                "vault_secret",
            ]
        );
        let unique: BTreeSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());

        let sources: Vec<&str> = data_sources().iter().map(|d| d.type_name()).collect();
        assert_eq!(sources, vec!["virtual_network"]);
    }

    #[test]
    fn test_every_schema_has_a_computed_id() {
        for resource in all() {
            let schema = resource.schema();
            let id = schema
                .block
                .attributes
                .get("id")
                .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
            assert!(id.flags.is_computed_only(), "{}", resource.type_name());
            assert!(!id.plan_modifiers.is_empty(), "{}", resource.type_name());
        }
    }

    #[test]
    fn test_cloud_and_location_force_replacement() {
        for resource in all() {
            let schema = resource.schema();
            for name in ["cloud", "location"] {
                if let Some(attr) = schema.block.attributes.get(name) {
                    assert!(attr.force_new, "{}.{}", resource.type_name(), name);
                }
            }
        }
    }

    #[test]
    fn test_empty_config_reports_missing_attributes() {
        for resource in all() {
            let diagnostics = validate(&resource.schema(), &serde_json::json!({}));
            assert!(
                diagnostics.iter().any(|d| d.is_error()),
                "{} accepts an empty configuration",
                resource.type_name()
            );
        }
    }
}
