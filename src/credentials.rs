//! Per-call credential metadata.
//!
//! Every remote call carries the cloud credentials as a binary-encoded
//! `CloudCredentials` message under `cloud-creds-bin` and the API key under
//! `api_key`. The metadata is rebuilt for each call and never cached.

use prost::Message;
use tonic::metadata::{MetadataMap, MetadataValue};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::generated::resources::CloudCredentials;

/// Metadata key of the encoded credentials.
pub const CLOUD_CREDS_KEY: &str = "cloud-creds-bin";

/// Metadata key of the API key.
pub const API_KEY_KEY: &str = "api_key";

/// The credentials message for the clouds present in `config`.
pub fn cloud_credentials(config: &ProviderConfig) -> CloudCredentials {
    CloudCredentials {
        aws_creds: config.aws.clone(),
        azure_creds: config.azure.clone(),
        gcp_creds: config.gcp.clone(),
    }
}

/// Build the metadata attached to a remote call.
pub fn call_metadata(config: &ProviderConfig) -> Result<MetadataMap, ProviderError> {
    let creds = cloud_credentials(config);
    let mut buf = Vec::with_capacity(creds.encoded_len());
    creds
        .encode(&mut buf)
        .map_err(|e| ProviderError::Credentials(e.to_string()))?;

    let api_key = MetadataValue::try_from(config.api_key.as_str())
        .map_err(|e| ProviderError::Credentials(format!("invalid api key: {}", e)))?;

    let mut metadata = MetadataMap::new();
    metadata.insert_bin(CLOUD_CREDS_KEY, MetadataValue::from_bytes(&buf));
    metadata.insert(API_KEY_KEY, api_key);
    Ok(metadata)
}
