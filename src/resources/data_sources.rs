//! Read-only lookups of existing resources.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::common::CLOUDS;
use super::network::{virtual_network_schema, VirtualNetwork};
use super::Wire;
use crate::context::ProviderContext;
use crate::enums::{CloudProvider, EnumValue};
use crate::error::ProviderError;
use crate::generated::resources::{ReadRequest, VirtualNetworkResource};
use crate::resource::DynDataSource;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::validation::validate;
use crate::validators::EnumValidator;
use crate::value::StringValue;

/// Inputs of a lookup by id.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LookupById {
    id: StringValue,
    cloud: EnumValue<CloudProvider>,
}

/// Looks up an existing virtual network by id.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualNetworkDataSource;

/// Schema of the `virtual_network` data source: every resource attribute as
/// output, with `id` as the lookup key and `cloud` as an optional hint used
/// to refresh the service first.
pub fn virtual_network_data_source_schema() -> Schema {
    let schema = Schema {
        version: 0,
        block: virtual_network_schema().block.all_computed(),
    };
    schema
        .with_description("Looks up an existing virtual network")
        .with_attribute(
            "id",
            Attribute::required_string().with_description("Id of the network to look up"),
        )
        .with_attribute(
            "cloud",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                .with_description("Cloud the network lives in")
                .with_validator(EnumValidator::new(CLOUDS)),
        )
}

#[async_trait]
impl DynDataSource for VirtualNetworkDataSource {
    fn type_name(&self) -> &'static str {
        "virtual_network"
    }

    fn schema(&self) -> Schema {
        virtual_network_data_source_schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate(&self.schema(), config)
    }

    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let lookup: LookupById = serde_json::from_value(config)?;
        let id = lookup.id.into_known().ok_or_else(|| {
            ProviderError::Validation("virtual_network lookup needs a known id".to_string())
        })?;

        if let Some(cloud) = lookup.cloud.get() {
            ctx.refresh(cloud).await?;
        }

        debug!(id = %id, "Looking up virtual network");
        let reply: VirtualNetworkResource = ctx
            .call(crate::method!("Read", "VirtualNetwork"), &ReadRequest { resource_id: id })
            .await?;
        Ok(serde_json::to_value(VirtualNetwork::from_reply(reply))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteClient;
    use crate::config::ProviderConfig;
    use crate::generated::resources::CommonResourceParameters;
    use crate::testing::{reply, FakeTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn context(transport: Arc<FakeTransport>) -> ProviderContext {
        let config = ProviderConfig {
            api_key: "key".to_string(),
            ..Default::default()
        };
        ProviderContext::new(config, RemoteClient::new(transport))
    }

    fn network_reply() -> Result<Vec<u8>, tonic::Status> {
        reply(&VirtualNetworkResource {
            common_parameters: Some(CommonResourceParameters {
                resource_id: "vn-1".to_string(),
                cloud_provider: CloudProvider::Aws as i32,
                ..Default::default()
            }),
            name: "main".to_string(),
            cidr_block: "10.0.0.0/16".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_schema_is_read_only_except_lookup_keys() {
        let schema = virtual_network_data_source_schema();
        assert!(schema.block.attributes["id"].flags.required);
        assert!(schema.block.attributes["cloud"].flags.optional);
        assert!(schema.block.attributes["name"].flags.is_computed_only());
        assert!(schema.block.attributes["cidr_block"].flags.is_computed_only());

        let source = VirtualNetworkDataSource;
        assert!(source.validate(&json!({"id": "vn-1"})).is_empty());
        assert!(!source.validate(&json!({})).is_empty());
        assert!(!source.validate(&json!({"id": "vn-1", "cloud": "oracle"})).is_empty());
    }

    #[tokio::test]
    async fn test_read_refreshes_then_reads() {
        let transport = Arc::new(FakeTransport::new(|method, _| {
            if method.ends_with("RefreshState") {
                Ok(Vec::new())
            } else {
                network_reply()
            }
        }));
        let ctx = context(transport.clone());

        let state = VirtualNetworkDataSource
            .read(&ctx, json!({"id": "vn-1", "cloud": "aws"}))
            .await
            .unwrap();
        assert_eq!(state["id"], "vn-1");
        assert_eq!(state["name"], "main");
        assert_eq!(state["cloud"], "aws");

        let methods: Vec<&str> = transport.calls().iter().map(|c| c.method).collect();
        assert!(methods[0].ends_with("RefreshState"));
        assert!(methods[1].ends_with("ReadVirtualNetwork"));
        let request: ReadRequest = transport.calls()[1].request();
        assert_eq!(request.resource_id, "vn-1");
    }

    #[tokio::test]
    async fn test_read_without_cloud_skips_refresh() {
        let transport = Arc::new(FakeTransport::new(|_, _| network_reply()));
        let ctx = context(transport.clone());

        VirtualNetworkDataSource
            .read(&ctx, json!({"id": "vn-1"}))
            .await
            .unwrap();
        assert!(transport.calls_to(crate::client::REFRESH_STATE).is_empty());
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_network_is_an_error() {
        let transport = Arc::new(FakeTransport::new(|_, _| {
            Err(tonic::Status::not_found("no such network"))
        }));
        let ctx = context(transport);

        let err = VirtualNetworkDataSource
            .read(&ctx, json!({"id": "vn-404"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
