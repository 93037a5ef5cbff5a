//! The host-facing gRPC server.
//!
//! [`ProviderService`] is the JSON-valued trait the provider implements; the
//! private `ProviderGrpcService` adapts it to the generated Hemmer protocol,
//! turning errors into diagnostics. [`serve`] binds a port, prints the
//! handshake line and runs until SIGTERM or SIGINT.
//!
//! # Signal Handling
//!
//! When a signal is received, the server:
//! 1. Stops accepting new connections
//! 2. Waits for in-flight requests to complete, up to
//!    [`ServeOptions::shutdown_timeout`]
//! 3. Calls the provider's `stop()` method

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated::provider as proto;
use crate::schema::{
    has_errors, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema,
};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// The provider operations the host drives, with states as JSON.
///
/// Errors returned here reach the host as a single error diagnostic; the
/// gRPC calls themselves always succeed.
///
/// ```ignore
/// use multy_provider::{serve, MultyProvider};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     serve(MultyProvider::new()).await
/// }
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata for performance optimization.
    /// By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    /// Returns diagnostics (errors and warnings).
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade resource state from an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        // Default: no upgrade needed, return state as-is
        Ok(state)
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "import for resource type {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

/// Wrapper that implements the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

/// Decode a JSON payload from the host; an empty payload is `null`.
fn decode_json(bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn encode_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

impl From<Diagnostic> for proto::Diagnostic {
    fn from(d: Diagnostic) -> Self {
        let severity = match d.severity {
            DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
            DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
        };
        Self {
            severity: severity as i32,
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        }
    }
}

/// Log a failed provider call and turn the error into the single error
/// diagnostic the host shows for it.
fn report<T>(
    operation: &str,
    subject: &str,
    result: Result<T, ProviderError>,
) -> Result<T, Vec<proto::Diagnostic>> {
    result.map_err(|err| {
        error!(operation, subject, error = %err, "Provider call failed");
        let detail = match err.code() {
            Some(code) => format!("{} {}: remote service returned {:?}", operation, subject, code),
            None => format!("{} {}", operation, subject),
        };
        vec![proto::Diagnostic {
            severity: proto::diagnostic::Severity::Error as i32,
            summary: err.to_string(),
            detail,
            attribute: String::new(),
        }]
    })
}

/// Flatten a validation call into host diagnostics.
fn checked(
    operation: &str,
    subject: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match report(operation, subject, result) {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                warn!(operation, subject, diagnostics = diagnostics.len(), "Configuration rejected");
            } else {
                debug!(operation, subject, "Configuration accepted");
            }
            diagnostics.into_iter().map(Into::into).collect()
        }
        Err(diagnostics) => diagnostics,
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn schemas_to_proto(schemas: &BTreeMap<String, Schema>) -> HashMap<String, proto::Schema> {
    schemas
        .iter()
        .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
        .collect()
}

fn block_to_proto(block: &Block) -> proto::Block {
    proto::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| proto::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: Vec::new(),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| proto::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => proto::nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => proto::nested_block::NestingMode::List as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

type GrpcResult<T> = Result<tonic::Response<T>, tonic::Status>;

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<proto::GetMetadataRequest>,
    ) -> GrpcResult<proto::GetMetadataResponse> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata"
        );
        Ok(tonic::Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(metadata.capabilities.into()),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<proto::GetSchemaRequest>,
    ) -> GrpcResult<proto::GetSchemaResponse> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema"
        );
        Ok(tonic::Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schemas_to_proto(&schema.resources),
            data_sources: schemas_to_proto(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::ValidateProviderConfigRequest>,
    ) -> GrpcResult<proto::ValidateProviderConfigResponse> {
        let req = request.into_inner();
        let result = async {
            let config = decode_json(&req.config)?;
            self.provider.validate_provider_config(config).await
        }
        .await;
        Ok(tonic::Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: checked("validate", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<proto::ConfigureRequest>,
    ) -> GrpcResult<proto::ConfigureResponse> {
        let req = request.into_inner();
        let result = async {
            let config = decode_json(&req.config)?;
            self.provider.configure(config).await
        }
        .await;
        let diagnostics = checked("configure", "provider", result);
        if diagnostics.is_empty() {
            info!("Provider configured");
        }
        Ok(tonic::Response::new(proto::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<proto::StopRequest>,
    ) -> GrpcResult<proto::StopResponse> {
        info!("Stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            }
        };
        Ok(tonic::Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::ValidateResourceConfigRequest>,
    ) -> GrpcResult<proto::ValidateResourceConfigResponse> {
        let req = request.into_inner();
        let result = async {
            let config = decode_json(&req.config)?;
            self.provider
                .validate_resource_config(&req.resource_type, config)
                .await
        }
        .await;
        Ok(tonic::Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: checked("validate", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type = %request.get_ref().resource_type))]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<proto::UpgradeResourceStateRequest>,
    ) -> GrpcResult<proto::UpgradeResourceStateResponse> {
        let req = request.into_inner();
        let result = async {
            let state = decode_json(&req.raw_state)?;
            self.provider
                .upgrade_resource_state(&req.resource_type, req.version, state)
                .await
        }
        .await;
        let response = report("upgrade", &req.resource_type, result)
            .map(|state| proto::UpgradeResourceStateResponse {
                upgraded_state: encode_json(&state),
                ..Default::default()
            })
            .unwrap_or_else(|diagnostics| proto::UpgradeResourceStateResponse {
                diagnostics,
                ..Default::default()
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type = %request.get_ref().resource_type))]
    async fn plan(
        &self,
        request: tonic::Request<proto::PlanRequest>,
    ) -> GrpcResult<proto::PlanResponse> {
        let req = request.into_inner();
        let result = async {
            let prior_state = Some(decode_json(&req.prior_state)?).filter(|v| !v.is_null());
            let proposed_state = decode_json(&req.proposed_state)?;
            let config = decode_json(&req.config)?;
            debug!(is_create = prior_state.is_none(), "Planning");
            self.provider
                .plan(&req.resource_type, prior_state, proposed_state, config)
                .await
        }
        .await;
        let response = report("plan", &req.resource_type, result)
            .map(|plan| {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan ready"
                );
                proto::PlanResponse {
                    planned_state: encode_json(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    replace_paths: plan.replace_paths,
                    diagnostics: vec![],
                }
            })
            .unwrap_or_else(|diagnostics| proto::PlanResponse {
                diagnostics,
                ..Default::default()
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type = %request.get_ref().resource_type))]
    async fn create(
        &self,
        request: tonic::Request<proto::CreateRequest>,
    ) -> GrpcResult<proto::CreateResponse> {
        let req = request.into_inner();
        let result = async {
            let planned_state = decode_json(&req.planned_state)?;
            self.provider.create(&req.resource_type, planned_state).await
        }
        .await;
        let response = report("create", &req.resource_type, result)
            .map(|state| proto::CreateResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            })
            .unwrap_or_else(|diagnostics| proto::CreateResponse {
                state: vec![],
                diagnostics,
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type = %request.get_ref().resource_type))]
    async fn read(&self, request: tonic::Request<proto::ReadRequest>) -> GrpcResult<proto::ReadResponse> {
        let req = request.into_inner();
        let result = async {
            let current_state = decode_json(&req.current_state)?;
            self.provider.read(&req.resource_type, current_state).await
        }
        .await;
        let response = report("read", &req.resource_type, result)
            .map(|state| proto::ReadResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            })
            .unwrap_or_else(|diagnostics| proto::ReadResponse {
                state: vec![],
                diagnostics,
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type = %request.get_ref().resource_type))]
    async fn update(
        &self,
        request: tonic::Request<proto::UpdateRequest>,
    ) -> GrpcResult<proto::UpdateResponse> {
        let req = request.into_inner();
        let result = async {
            let prior_state = decode_json(&req.prior_state)?;
            let planned_state = decode_json(&req.planned_state)?;
            self.provider
                .update(&req.resource_type, prior_state, planned_state)
                .await
        }
        .await;
        let response = report("update", &req.resource_type, result)
            .map(|state| proto::UpdateResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            })
            .unwrap_or_else(|diagnostics| proto::UpdateResponse {
                state: vec![],
                diagnostics,
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type = %request.get_ref().resource_type))]
    async fn delete(
        &self,
        request: tonic::Request<proto::DeleteRequest>,
    ) -> GrpcResult<proto::DeleteResponse> {
        let req = request.into_inner();
        let result = async {
            let current_state = decode_json(&req.current_state)?;
            self.provider.delete(&req.resource_type, current_state).await
        }
        .await;
        Ok(tonic::Response::new(proto::DeleteResponse {
            diagnostics: report("delete", &req.resource_type, result).err().unwrap_or_default(),
        }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type = %request.get_ref().resource_type))]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::ImportResourceStateRequest>,
    ) -> GrpcResult<proto::ImportResourceStateResponse> {
        let req = request.into_inner();
        debug!(id = %req.id, "Importing");
        let result = self.provider.import_resource(&req.resource_type, &req.id).await;
        let response = report("import", &req.resource_type, result)
            .map(|imported| proto::ImportResourceStateResponse {
                imported: imported
                    .into_iter()
                    .map(|r| proto::ImportedResource {
                        resource_type: r.resource_type,
                        state: encode_json(&r.state),
                    })
                    .collect(),
                diagnostics: vec![],
            })
            .unwrap_or_else(|diagnostics| proto::ImportResourceStateResponse {
                imported: vec![],
                diagnostics,
            });
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<proto::ValidateDataSourceConfigRequest>,
    ) -> GrpcResult<proto::ValidateDataSourceConfigResponse> {
        let req = request.into_inner();
        let result = async {
            let config = decode_json(&req.config)?;
            self.provider
                .validate_data_source_config(&req.data_source_type, config)
                .await
        }
        .await;
        Ok(tonic::Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: checked("validate", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type = %request.get_ref().data_source_type))]
    async fn read_data_source(
        &self,
        request: tonic::Request<proto::ReadDataSourceRequest>,
    ) -> GrpcResult<proto::ReadDataSourceResponse> {
        let req = request.into_inner();
        let result = async {
            let config = decode_json(&req.config)?;
            self.provider
                .read_data_source(&req.data_source_type, config)
                .await
        }
        .await;
        let response = report("read", &req.data_source_type, result)
            .map(|state| proto::ReadDataSourceResponse {
                state: encode_json(&state),
                diagnostics: vec![],
            })
            .unwrap_or_else(|diagnostics| proto::ReadDataSourceResponse {
                state: vec![],
                diagnostics,
            });
        Ok(tonic::Response::new(response))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Timeout for graceful shutdown. After receiving a shutdown signal,
    /// the server will wait this long for in-flight requests to complete.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// On Unix, this waits for SIGTERM or SIGINT.
/// On Windows, this waits for CTRL+C.
/// If the handlers cannot be installed, this never returns.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to install signal handlers");
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install CTRL+C handler");
            return std::future::pending().await;
        }
        info!("Received CTRL+C, initiating graceful shutdown");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider implementation as a gRPC server.
///
/// This function:
/// 1. Finds an available port
/// 2. Starts the gRPC server
/// 3. Outputs the handshake string to stdout
/// 4. Handles shutdown signals (SIGTERM/SIGINT) gracefully
///
/// The handshake format is: `HEMMER_PROVIDER|<version>|<address>`
///
/// For custom configuration, use [`serve_with_options`].
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider with custom options.
///
/// See [`serve`] for details. This function allows configuring
/// shutdown behavior via [`ServeOptions`].
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    // Find an available port by binding to port 0
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    serve_on_listener(provider, listener, addr, options).await
}

/// Serve on an already-bound listener.
async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let grpc_service = ProviderGrpcService {
        provider: Arc::clone(&provider),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        Server::builder()
            .add_service(proto::provider_server::ProviderServer::new(grpc_service))
            .serve_with_incoming_shutdown(
                tokio_stream::wrappers::TcpListenerStream::new(listener),
                async {
                    let _ = shutdown_rx.await;
                },
            ),
    );

    tokio::select! {
        result = &mut server => {
            result??;
            warn!("Server exited before a shutdown signal");
        }
        _ = wait_for_shutdown_signal() => {
            let _ = shutdown_tx.send(());
            // The drain timeout only starts once shutdown is requested.
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => {
                    result??;
                    info!("Server shutdown complete");
                }
                Err(_) => {
                    warn!(
                        timeout = ?options.shutdown_timeout,
                        "Shutdown timeout exceeded, forcing shutdown"
                    );
                }
            }
        }
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}
