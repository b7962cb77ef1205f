//! Wire types for the `authorization.v1` gRPC service.
//!
//! The message structs mirror the published protobuf schema and are
//! hand-maintained (the schema is one message pair and an enum; code
//! generation would only add a build-time protoc dependency). Field tags
//! must never change: external plugins speak this exact encoding.

use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;

/// The kind of operation a request wants to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RequestType {
    Unspecified = 0,
    Download = 1,
    Upload = 2,
    GetMetadata = 3,
    List = 4,
    Delete = 5,
}

/// One replicated HTTP header: a key and every value it carried.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub values: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// The authorization question: may this request proceed?
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthorizeRequest {
    /// Object key (or listing prefix) the request addresses.
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    /// Id of the provider the request targets.
    #[prost(string, tag = "2")]
    pub provider: ::prost::alloc::string::String,
    #[prost(enumeration = "RequestType", tag = "3")]
    pub request_type: i32,
    /// The full incoming HTTP header map.
    #[prost(message, repeated, tag = "4")]
    pub headers: ::prost::alloc::vec::Vec<Header>,
}

/// Success carries no payload; denial is a status-coded error.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct AuthorizeResponse {}

/// Full method path of the single RPC.
const AUTHORIZE_PATH: &str = "/authorization.v1.AuthorizationService/Authorize";

/// Client for the authorization service.
///
/// A hand-maintained equivalent of the generated tonic client, reduced
/// to the one transport and one RPC the facade uses.
#[derive(Clone, Debug)]
pub struct AuthorizationServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl AuthorizationServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    /// Invoke `Authorize`. A clean response means the request is
    /// allowed; any [`tonic::Status`] is a decision or a failure, told
    /// apart by its code.
    pub async fn authorize(
        &mut self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizeResponse, tonic::Status> {
        self.inner.ready().await.map_err(|err| {
            tonic::Status::unknown(format!("authorization transport not ready: {err}"))
        })?;

        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(AUTHORIZE_PATH);
        let response = self
            .inner
            .unary(tonic::Request::new(request), path, codec)
            .await?;
        Ok(response.into_inner())
    }
}
