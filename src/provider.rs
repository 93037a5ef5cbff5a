//! The Multy provider: the resource catalog behind [`ProviderService`].

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{GrpcTransport, RemoteClient, Transport};
use crate::config::{process_env, provider_schema, EnvLookup, ProviderConfig};
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::resource::{DynDataSource, DynResource};
use crate::resources;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Serves every Multy resource kind and data source.
///
/// Resource operations that talk to the remote service fail with
/// [`ProviderError::NotConfigured`] until `configure` succeeds. The context
/// built by `configure` is installed once; a second `configure` is rejected.
pub struct MultyProvider {
    resources: BTreeMap<&'static str, Arc<dyn DynResource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DynDataSource>>,
    context: OnceLock<ProviderContext>,
    transport: Option<Arc<dyn Transport>>,
    env: EnvLookup,
}

impl MultyProvider {
    /// A provider over the full catalog, talking to the default endpoint.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: resources::data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            context: OnceLock::new(),
            transport: None,
            env: process_env(),
        }
    }

    /// Use `transport` instead of a gRPC channel to the default endpoint.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Resolve environment fallbacks through `env` instead of the process
    /// environment.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// Whether `configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.context.get().is_some()
    }

    fn context(&self) -> Result<&ProviderContext, ProviderError> {
        self.context.get().ok_or(ProviderError::NotConfigured)
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn DynResource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DynDataSource>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!("data source {}", data_source_type))
        })
    }
}

impl Default for MultyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for MultyProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, (name, r)| s.with_resource(*name, r.schema()));
        self.data_sources
            .iter()
            .fold(schema, |s, (name, d)| s.with_data_source(*name, d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        if self.is_configured() {
            warn!("Configure called twice");
            return Ok(vec![Diagnostic::error("Provider already configured")
                .with_detail("The provider configuration cannot change once it is set.")]);
        }

        let config = match ProviderConfig::from_json(&config, &self.env) {
            Ok(config) => config,
            Err(diagnostics) => return Ok(diagnostics),
        };
        info!(
            aws = config.aws.is_some(),
            azure = config.azure.is_some(),
            gcp = config.gcp.is_some(),
            "Configuring provider"
        );

        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(GrpcTransport::connect_default()),
        };
        let context = ProviderContext::new(config, RemoteClient::new(transport));
        if self.context.set(context).is_err() {
            return Ok(vec![Diagnostic::error("Provider already configured")]);
        }
        Ok(Vec::new())
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("Provider stopping");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.resource(resource_type)?
            .modify_plan(prior_state, proposed_state, config)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        resource.create(self.context()?, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        resource.read(self.context()?, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        resource
            .update(self.context()?, prior_state, planned_state)
            .await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        resource.delete(self.context()?, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Ok(vec![self.resource(resource_type)?.import(id)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        data_source.read(self.context()?, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::API_KEY_ENV;
    use crate::testing::{assert_error_contains, FakeTransport, ProviderTester};
    use serde_json::json;

    fn no_env() -> EnvLookup {
        Arc::new(|_| None)
    }

    fn provider(fake: Arc<FakeTransport>) -> MultyProvider {
        MultyProvider::new().with_transport(fake).with_env(no_env())
    }

    #[test]
    fn test_schema_covers_catalog() {
        let provider = MultyProvider::new();
        let schema = provider.schema();
        assert_eq!(schema.resources.len(), 17);
        assert!(schema.resources.contains_key("kubernetes_node_pool"));
        assert!(schema.data_sources.contains_key("virtual_network"));
        assert!(schema.provider.block.attributes["api_key"].flags.sensitive);

        let metadata = provider.metadata();
        assert_eq!(metadata.resources.len(), 17);
        assert_eq!(metadata.data_sources, vec!["virtual_network"]);
    }

    #[tokio::test]
    async fn test_empty_api_key_leaves_provider_unconfigured() {
        let tester = ProviderTester::new(provider(Arc::new(FakeTransport::ok())));
        let err = tester.configure(json!({"api_key": ""})).await.unwrap_err();
        assert_error_contains(err.diagnostics(), "Api Key cannot be an empty string");
        assert!(!tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_api_key_from_injected_env() {
        let env: EnvLookup = Arc::new(|name| (name == API_KEY_ENV).then(|| "env-key".to_string()));
        let provider = MultyProvider::new()
            .with_transport(Arc::new(FakeTransport::ok()))
            .with_env(env);
        let tester = ProviderTester::new(provider);
        tester.configure(json!({})).await.unwrap();
        assert!(tester.provider().is_configured());
    }

    #[tokio::test]
    async fn test_second_configure_is_rejected() {
        let tester = ProviderTester::new(provider(Arc::new(FakeTransport::ok())));
        tester.configure(json!({"api_key": "first"})).await.unwrap();

        let err = tester.configure(json!({"api_key": "second"})).await.unwrap_err();
        assert_error_contains(err.diagnostics(), "already configured");
        assert_eq!(
            tester.provider().context().unwrap().config().api_key,
            "first"
        );
    }

    #[tokio::test]
    async fn test_operations_before_configure() {
        let fake = Arc::new(FakeTransport::ok());
        let tester = ProviderTester::new(provider(fake.clone()));

        let err = tester
            .create("public_ip", json!({"name": "ip", "cloud": "aws", "location": "us_east_1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
        assert!(err.to_string().contains("not configured"));

        let err = tester
            .read_data_source("virtual_network", json!({"id": "vn-1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));

        // Planning and validation never reach the service.
        let config = json!({"name": "ip", "cloud": "aws", "location": "us_east_1"});
        tester.validate_resource_config("public_ip", config.clone()).await.unwrap();
        tester.plan_create("public_ip", config).await.unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let tester = ProviderTester::new(provider(Arc::new(FakeTransport::ok())));
        let err = tester.plan_create("load_balancer", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester
            .read_data_source("subnet", json!({"id": "s"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_import_sets_id_only() {
        let tester = ProviderTester::new(provider(Arc::new(FakeTransport::ok())));
        let imported = tester.import_resource("subnet", "subnet-7").await.unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "subnet");
        assert_eq!(imported[0].state, json!({"id": "subnet-7"}));
    }
}
