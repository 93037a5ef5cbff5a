//! Shared state handed to every resource operation.

use tracing::debug;

use crate::client::{RemoteClient, REFRESH_STATE};
use crate::config::ProviderConfig;
use crate::credentials::call_metadata;
use crate::enums::CloudProvider;
use crate::error::ProviderError;
use crate::generated::resources::{RefreshStateRequest, RefreshStateResponse};
use crate::refresh::RefreshCoordinator;

/// The configured provider: credentials, remote client and refresh cache.
///
/// Built once by `configure` and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    config: ProviderConfig,
    client: RemoteClient,
    refresh: RefreshCoordinator,
}

impl ProviderContext {
    /// Bundle a resolved configuration with a client.
    pub fn new(config: ProviderConfig, client: RemoteClient) -> Self {
        Self {
            config,
            client,
            refresh: RefreshCoordinator::new(),
        }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Call a remote method with fresh credential metadata.
    pub async fn call<Req, Resp>(&self, method: &'static str, req: &Req) -> Result<Resp, ProviderError>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let metadata = call_metadata(&self.config)?;
        self.client.call(method, req, metadata).await
    }

    /// Make sure the remote service has refreshed its view of `cloud`.
    pub async fn refresh(&self, cloud: CloudProvider) -> Result<(), ProviderError> {
        self.refresh
            .refresh(&self.config.api_key, cloud, || async move {
                let _: RefreshStateResponse = self
                    .call(
                        REFRESH_STATE,
                        &RefreshStateRequest {
                            cloud: cloud as i32,
                        },
                    )
                    .await?;
                debug!(cloud = cloud.as_str_name(), "RefreshState completed");
                Ok(())
            })
            .await
    }
}
