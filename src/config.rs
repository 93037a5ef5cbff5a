//! Provider configuration.
//!
//! The host sends the provider block as JSON. It is decoded into
//! [`ProviderConfigModel`] and then resolved into a [`ProviderConfig`]: null
//! attributes fall back to the conventional environment variables, unknown
//! attributes are rejected, and each cloud's credentials are kept only when at
//! least one of their fields resolves.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::generated::resources::{AwsCredentials, AzureCredentials, GcpCredentials};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::value::{block_or_none, StringValue};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "MULTY_API_KEY";

/// Looks up an environment variable. Injectable so tests do not touch the
/// process environment.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|name| std::env::var(name).ok())
}

/// The provider block as the host sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfigModel {
    /// API key for the remote service.
    pub api_key: StringValue,
    /// AWS credentials.
    #[serde(deserialize_with = "block_or_none")]
    pub aws: Option<AwsModel>,
    /// Azure credentials.
    #[serde(deserialize_with = "block_or_none")]
    pub azure: Option<AzureModel>,
    /// GCP credentials.
    #[serde(deserialize_with = "block_or_none")]
    pub gcp: Option<GcpModel>,
}

/// The `aws` block.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AwsModel {
    /// Falls back to `AWS_ACCESS_KEY_ID`.
    pub access_key_id: StringValue,
    /// Falls back to `AWS_SECRET_ACCESS_KEY`.
    pub secret_access_key: StringValue,
    /// Falls back to `AWS_SESSION_TOKEN`.
    pub session_token: StringValue,
}

/// The `azure` block.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AzureModel {
    /// Falls back to `ARM_SUBSCRIPTION_ID`.
    pub subscription_id: StringValue,
    /// Falls back to `ARM_TENANT_ID`.
    pub tenant_id: StringValue,
    /// Falls back to `ARM_CLIENT_ID`.
    pub client_id: StringValue,
    /// Falls back to `ARM_CLIENT_SECRET`.
    pub client_secret: StringValue,
}

/// The `gcp` block.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GcpModel {
    /// Falls back to `GOOGLE_CREDENTIALS`.
    pub credentials: StringValue,
    /// Falls back to `GOOGLE_PROJECT`.
    pub project: StringValue,
}

/// Resolved provider configuration, fixed for the life of the process.
#[derive(Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// API key sent with every call.
    pub api_key: String,
    /// AWS credentials, if any resolved.
    pub aws: Option<AwsCredentials>,
    /// Azure credentials, if any resolved.
    pub azure: Option<AzureCredentials>,
    /// GCP credentials, if any resolved.
    pub gcp: Option<GcpCredentials>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("aws", &self.aws.is_some())
            .field("azure", &self.azure.is_some())
            .field("gcp", &self.gcp.is_some())
            .finish()
    }
}

/// The schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Multy provider configuration")
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!("Multy API key. Defaults to ${}", API_KEY_ENV)),
        )
        .with_block(
            "aws",
            NestedBlock::single(
                Block::new()
                    .with_attribute("access_key_id", Attribute::optional_string())
                    .with_attribute("secret_access_key", Attribute::optional_string().sensitive())
                    .with_attribute("session_token", Attribute::optional_string().sensitive()),
            ),
        )
        .with_block(
            "azure",
            NestedBlock::single(
                Block::new()
                    .with_attribute("subscription_id", Attribute::optional_string())
                    .with_attribute("tenant_id", Attribute::optional_string())
                    .with_attribute("client_id", Attribute::optional_string())
                    .with_attribute("client_secret", Attribute::optional_string().sensitive()),
            ),
        )
        .with_block(
            "gcp",
            NestedBlock::single(
                Block::new()
                    .with_attribute("credentials", Attribute::optional_string().sensitive())
                    .with_attribute("project", Attribute::optional_string()),
            ),
        )
}

struct Resolver<'a> {
    env: &'a (dyn Fn(&str) -> Option<String> + Send + Sync),
    diagnostics: Vec<Diagnostic>,
}

impl Resolver<'_> {
    fn resolve(
        &mut self,
        value: &StringValue,
        env_var: &str,
        label: &str,
        path: &str,
    ) -> Option<String> {
        match value {
            StringValue::Known(v) => Some(v.clone()),
            StringValue::Null => (self.env)(env_var),
            StringValue::Unknown => {
                self.diagnostics.push(
                    Diagnostic::error(format!("Unknown {}", label))
                        .with_detail(format!(
                            "The provider cannot be configured because {} is not known yet. \
                             Set it statically or use the {} environment variable.",
                            path, env_var
                        ))
                        .with_attribute(path),
                );
                None
            }
        }
    }

    fn resolve_optional(
        &mut self,
        value: Option<&StringValue>,
        env_var: &str,
        label: &str,
        path: &str,
    ) -> Option<String> {
        let null = StringValue::Null;
        self.resolve(value.unwrap_or(&null), env_var, label, path)
            .filter(|v| !v.is_empty())
    }

    fn aws(&mut self, block: Option<&AwsModel>) -> Option<AwsCredentials> {
        let access_key = self.resolve_optional(
            block.map(|b| &b.access_key_id),
            "AWS_ACCESS_KEY_ID",
            "AWS Access Key ID",
            "aws.access_key_id",
        );
        let secret_key = self.resolve_optional(
            block.map(|b| &b.secret_access_key),
            "AWS_SECRET_ACCESS_KEY",
            "AWS Secret Access Key",
            "aws.secret_access_key",
        );
        let session_token = self.resolve_optional(
            block.map(|b| &b.session_token),
            "AWS_SESSION_TOKEN",
            "AWS Session Token",
            "aws.session_token",
        );

        if access_key.is_none() && secret_key.is_none() && session_token.is_none() {
            return None;
        }
        Some(AwsCredentials {
            access_key: access_key.unwrap_or_default(),
            secret_key: secret_key.unwrap_or_default(),
            session_token: session_token.unwrap_or_default(),
        })
    }

    fn azure(&mut self, block: Option<&AzureModel>) -> Option<AzureCredentials> {
        let subscription_id = self.resolve_optional(
            block.map(|b| &b.subscription_id),
            "ARM_SUBSCRIPTION_ID",
            "Azure Subscription ID",
            "azure.subscription_id",
        );
        let tenant_id = self.resolve_optional(
            block.map(|b| &b.tenant_id),
            "ARM_TENANT_ID",
            "Azure Tenant ID",
            "azure.tenant_id",
        );
        let client_id = self.resolve_optional(
            block.map(|b| &b.client_id),
            "ARM_CLIENT_ID",
            "Azure Client ID",
            "azure.client_id",
        );
        let client_secret = self.resolve_optional(
            block.map(|b| &b.client_secret),
            "ARM_CLIENT_SECRET",
            "Azure Client Secret",
            "azure.client_secret",
        );

        if subscription_id.is_none()
            && tenant_id.is_none()
            && client_id.is_none()
            && client_secret.is_none()
        {
            return None;
        }
        Some(AzureCredentials {
            subscription_id: subscription_id.unwrap_or_default(),
            tenant_id: tenant_id.unwrap_or_default(),
            client_id: client_id.unwrap_or_default(),
            client_secret: client_secret.unwrap_or_default(),
        })
    }

    fn gcp(&mut self, block: Option<&GcpModel>) -> Option<GcpCredentials> {
        let credentials = self.resolve_optional(
            block.map(|b| &b.credentials),
            "GOOGLE_CREDENTIALS",
            "GCP Credentials",
            "gcp.credentials",
        );
        let project = self.resolve_optional(
            block.map(|b| &b.project),
            "GOOGLE_PROJECT",
            "GCP Project",
            "gcp.project",
        );

        if credentials.is_none() && project.is_none() {
            return None;
        }
        Some(GcpCredentials {
            credentials: credentials.unwrap_or_default(),
            project: project.unwrap_or_default(),
        })
    }
}

impl ProviderConfig {
    /// Resolve the host's provider block. Returns every problem found as a
    /// diagnostic.
    pub fn from_json(config: &Value, env: &EnvLookup) -> Result<Self, Vec<Diagnostic>> {
        let model: ProviderConfigModel = if config.is_null() {
            ProviderConfigModel::default()
        } else {
            serde_json::from_value(config.clone()).map_err(|e| {
                vec![Diagnostic::error("Invalid provider configuration").with_detail(e.to_string())]
            })?
        };

        let mut resolver = Resolver {
            env: env.as_ref(),
            diagnostics: Vec::new(),
        };

        let api_key = resolver.resolve(&model.api_key, API_KEY_ENV, "Api Key", "api_key");
        let aws = resolver.aws(model.aws.as_ref());
        let azure = resolver.azure(model.azure.as_ref());
        let gcp = resolver.gcp(model.gcp.as_ref());

        let mut diagnostics = resolver.diagnostics;
        let api_key = match api_key {
            Some(key) if !key.is_empty() => key,
            _ if !model.api_key.is_unknown() => {
                diagnostics.push(
                    Diagnostic::error("Api Key cannot be an empty string")
                        .with_detail(format!(
                            "Set api_key in the provider block or the {} environment variable.",
                            API_KEY_ENV
                        ))
                        .with_attribute("api_key"),
                );
                String::new()
            }
            _ => String::new(),
        };

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(Self {
            api_key,
            aws,
            azure,
            gcp,
        })
    }
}
