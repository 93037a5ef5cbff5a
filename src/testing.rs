//! Testing utilities.
//!
//! [`FakeTransport`] stands in for the remote service: it records every call
//! and answers from a handler closure, so a whole provider lifecycle runs
//! in-process. [`ProviderTester`] drives a `ProviderService` the way the host
//! would, without a gRPC server.
//!
//! # Example
//!
//! ```ignore
//! use multy_provider::testing::{reply, FakeTransport, ProviderTester};
//! use multy_provider::MultyProvider;
//! use std::sync::Arc;
//!
//! let fake = Arc::new(FakeTransport::new(|_method, _body| reply(&RefreshStateResponse {})));
//! let tester = ProviderTester::new(MultyProvider::new().with_transport(fake.clone()));
//! tester.configure(json!({"api_key": "test"})).await.unwrap();
//! ```

use std::sync::{Mutex, PoisonError};

use prost::Message;
use serde_json::Value;
use tonic::metadata::MetadataMap;

use crate::client::Transport;
use crate::credentials::{API_KEY_KEY, CLOUD_CREDS_KEY};
use crate::error::ProviderError;
use crate::generated::resources::CloudCredentials;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Answers a remote call given its method path and encoded request.
pub type Handler = Box<dyn Fn(&str, &[u8]) -> Result<Vec<u8>, tonic::Status> + Send + Sync>;

/// Encode a reply message for a [`Handler`].
pub fn reply<T: Message>(message: &T) -> Result<Vec<u8>, tonic::Status> {
    Ok(message.encode_to_vec())
}

/// Decode a request inside a [`Handler`].
pub fn decode<T: Message + Default>(body: &[u8]) -> Result<T, tonic::Status> {
    T::decode(body).map_err(|e| tonic::Status::invalid_argument(e.to_string()))
}

/// One call seen by a [`FakeTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The method path.
    pub method: &'static str,
    /// The request metadata.
    pub metadata: MetadataMap,
    /// The encoded request.
    pub body: Vec<u8>,
}

impl RecordedCall {
    /// Decode the request.
    ///
    /// # Panics
    ///
    /// Panics if the body is not a `T`.
    pub fn request<T: Message + Default>(&self) -> T {
        T::decode(self.body.as_slice()).expect("recorded request does not decode")
    }

    /// The API key sent with the call.
    pub fn api_key(&self) -> Option<String> {
        self.metadata
            .get(API_KEY_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// The cloud credentials sent with the call.
    pub fn credentials(&self) -> Option<CloudCredentials> {
        let blob = self.metadata.get_bin(CLOUD_CREDS_KEY)?.to_bytes().ok()?;
        CloudCredentials::decode(blob.as_ref()).ok()
    }
}

/// An in-memory [`Transport`].
pub struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport")
            .field("calls", &self.calls().len())
            .finish_non_exhaustive()
    }
}

impl FakeTransport {
    /// A fake answering every call with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Result<Vec<u8>, tonic::Status> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A fake answering every call with an empty message.
    pub fn ok() -> Self {
        Self::new(|_, _| Ok(Vec::new()))
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The calls made to one method path.
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn unary(
        &self,
        method: &'static str,
        request: tonic::Request<Vec<u8>>,
    ) -> Result<Vec<u8>, tonic::Status> {
        let metadata = request.metadata().clone();
        let body = request.into_inner();
        let result = (self.handler)(method, &body);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method,
                metadata,
                body,
            });
        result
    }
}

/// Drives a provider the way the host does, without a gRPC server.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Configure the provider. Error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration. Error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create; the configuration doubles as the proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan an update; the configuration doubles as the proposed state.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed.
    Provider(ProviderError),
}

impl TestError {
    /// The error diagnostics, if that is how the operation failed.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            TestError::Provider(_) => &[],
        }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan forces replacement because of `path`.
///
/// # Panics
///
/// Panics if the plan does not require replacement or `path` is not among
/// the replace paths.
pub fn assert_plan_replaces(plan: &PlanResult, path: &str) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
    assert!(
        plan.replace_paths.iter().any(|p| p == path),
        "Expected '{}' to force replacement, got {:?}",
        path,
        plan.replace_paths
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but {:?} force replacement",
        plan.replace_paths
    );
}

/// Assert that a plan changes the given top-level attribute.
///
/// # Panics
///
/// Panics if no change has that path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary contains
/// `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
