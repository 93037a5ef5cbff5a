//! Client for the remote Multy resource service.
//!
//! Only message types are generated for the remote protocol. Calls go through
//! the [`Transport`] trait, which moves already-encoded request bytes to a
//! method path and returns the encoded reply. [`GrpcTransport`] does this over
//! a tonic channel; tests plug in an in-memory fake instead.

use std::sync::Arc;

use bytes::{Buf, BufMut};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Address of the remote service. Plain-text HTTP/2, no TLS.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

/// Fully-qualified service name used to build method paths.
pub const SERVICE_NAME: &str = "dev.multy.resources.v1.MultyResourceService";

/// Build the path of a remote method from literal parts, e.g.
/// `method!("ReadSubnet")` or `method!("Read", "Subnet")`.
#[macro_export]
macro_rules! method {
    ($($part:literal),+ $(,)?) => {
        concat!("/dev.multy.resources.v1.MultyResourceService/", $($part),+)
    };
}

/// Path of the `RefreshState` method.
pub const REFRESH_STATE: &str = method!("RefreshState");

/// Moves encoded unary requests to the remote service.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `request` to `method` and return the encoded reply.
    async fn unary(
        &self,
        method: &'static str,
        request: tonic::Request<Vec<u8>>,
    ) -> Result<Vec<u8>, tonic::Status>;
}

/// A codec that passes message bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Encode = Vec<u8>;
    type Decode = Vec<u8>;
    type Encoder = BytesCodec;
    type Decoder = BytesCodec;

    fn encoder(&mut self) -> Self::Encoder {
        BytesCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        BytesCodec
    }
}

impl Encoder for BytesCodec {
    type Item = Vec<u8>;
    type Error = tonic::Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for BytesCodec {
    type Item = Vec<u8>;
    type Error = tonic::Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining()).to_vec()))
    }
}

/// [`Transport`] over a tonic channel.
#[derive(Debug, Clone)]
pub struct GrpcTransport {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcTransport {
    /// Wrap an existing channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// A transport to [`DEFAULT_ENDPOINT`]. The connection is made on the
    /// first call, so building it never fails.
    pub fn connect_default() -> Self {
        Self::new(Endpoint::from_static(DEFAULT_ENDPOINT).connect_lazy())
    }
}

#[async_trait::async_trait]
impl Transport for GrpcTransport {
    async fn unary(
        &self,
        method: &'static str,
        request: tonic::Request<Vec<u8>>,
    ) -> Result<Vec<u8>, tonic::Status> {
        let mut grpc = self.inner.clone();
        grpc.ready().await.map_err(|e| {
            warn!(method, error = %e, "Remote service unavailable");
            tonic::Status::unavailable(format!("Service was not ready: {}", e))
        })?;
        let response = grpc
            .unary(request, PathAndQuery::from_static(method), BytesCodec)
            .await?;
        Ok(response.into_inner())
    }
}

/// Typed calls to the remote service.
#[derive(Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient").finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// Build a client over any transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Encode `req`, send it with `metadata` and decode the reply.
    pub async fn call<Req, Resp>(
        &self,
        method: &'static str,
        req: &Req,
        metadata: MetadataMap,
    ) -> Result<Resp, ProviderError>
    where
        Req: prost::Message,
        Resp: prost::Message + Default,
    {
        let mut request = tonic::Request::new(req.encode_to_vec());
        *request.metadata_mut() = metadata;

        debug!(method, "Calling remote service");
        let bytes = self.transport.unary(method, request).await?;
        Ok(Resp::decode(bytes.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generated::resources::{ReadRequest, SubnetResource};
    use prost::Message;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<(&'static str, Option<String>)>>,
        reply: Vec<u8>,
    }

    #[async_trait::async_trait]
    impl Transport for Echo {
        async fn unary(
            &self,
            method: &'static str,
            request: tonic::Request<Vec<u8>>,
        ) -> Result<Vec<u8>, tonic::Status> {
            let key = request
                .metadata()
                .get("api_key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen.lock().unwrap().push((method, key));
            let req = ReadRequest::decode(request.into_inner().as_slice())
                .map_err(|e| tonic::Status::invalid_argument(e.to_string()))?;
            if req.resource_id == "missing" {
                return Err(tonic::Status::not_found("subnet missing not found"));
            }
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_method_paths() {
        assert_eq!(
            method!("ReadSubnet"),
            "/dev.multy.resources.v1.MultyResourceService/ReadSubnet"
        );
        assert_eq!(method!("Read", "Subnet"), method!("ReadSubnet"));
        assert!(REFRESH_STATE.starts_with('/'));
        assert!(REFRESH_STATE[1..].starts_with(SERVICE_NAME));
    }

    #[tokio::test]
    async fn test_typed_call_round_trip() {
        let reply = SubnetResource {
            name: "subnet1".to_string(),
            cidr_block: "10.0.1.0/24".to_string(),
            ..Default::default()
        };
        let echo = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
            reply: reply.encode_to_vec(),
        });
        let client = RemoteClient::new(echo.clone());

        let mut metadata = MetadataMap::new();
        metadata.insert("api_key", "secret".parse().unwrap());

        let got: SubnetResource = client
            .call(
                method!("ReadSubnet"),
                &ReadRequest {
                    resource_id: "subnet-1".to_string(),
                },
                metadata,
            )
            .await
            .unwrap();
        assert_eq!(got, reply);

        let seen = echo.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, method!("ReadSubnet"));
        assert_eq!(seen[0].1.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_status_becomes_remote_error() {
        let client = RemoteClient::new(Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
            reply: vec![],
        }));
        let err = client
            .call::<_, SubnetResource>(
                method!("ReadSubnet"),
                &ReadRequest {
                    resource_id: "missing".to_string(),
                },
                MetadataMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "subnet missing not found");
    }

    #[tokio::test]
    async fn test_garbage_reply_is_a_decode_error() {
        let client = RemoteClient::new(Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
            reply: vec![0xff, 0xff, 0xff],
        }));
        let err = client
            .call::<_, SubnetResource>(
                method!("ReadSubnet"),
                &ReadRequest::default(),
                MetadataMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
