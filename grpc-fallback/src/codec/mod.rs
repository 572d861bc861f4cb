//! Wire encoding and decoding.
//!
//! This module contains the generic [`Codec`] trait, the two wire formats
//! that implement it ([`ProtoCodec`] and [`RestCodec`]), and the incremental
//! [`StreamArrayParser`] used for server streaming responses.

mod proto;
mod rest;
mod stream;
mod transcode;

pub use self::proto::ProtoCodec;
pub use self::rest::RestCodec;
pub use self::stream::{ParseEvent, StreamArrayParser, Streaming};

use crate::{MethodDescriptor, Status};
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

/// A message that can travel over both wire formats.
///
/// Messages need their binary protobuf encoding (`prost`) for the proto
/// format and their proto3 JSON mapping (`serde`, with `lowerCamelCase`
/// field names) for the REST format and for streamed responses. This trait
/// is implemented for every type that provides both.
pub trait RpcMessage: prost::Message + Default + Serialize + DeserializeOwned + Send + 'static {}

impl<T> RpcMessage for T where
    T: prost::Message + Default + Serialize + DeserializeOwned + Send + 'static
{
}

/// The wire format used to reach a service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Binary protobuf bodies posted to `/$rpc/<service>/<Method>`.
    #[default]
    Proto,
    /// JSON bodies on paths derived from `google.api.http` rules.
    Rest,
}

impl Protocol {
    /// A short name of the protocol, used in the `x-goog-api-client` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Proto => "proto",
            Protocol::Rest => "rest",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service is reached: `scheme://host:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceAddress {
    scheme: String,
    host: String,
    port: u16,
}

impl ServiceAddress {
    /// Create an address.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ServiceAddress {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// The URL scheme, `https` unless configured otherwise.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `scheme://host:port`, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// An encoded request, ready to be sent.
///
/// Each call creates its own `FetchParameters`; only its headers are touched
/// afterwards, when the stub merges in credential and call headers.
#[derive(Clone, Debug)]
pub struct FetchParameters {
    /// The HTTP verb.
    pub method: Method,
    /// The absolute request URL.
    pub url: String,
    /// Headers set by the codec, e.g. `content-type`.
    pub headers: HeaderMap,
    /// The encoded body. Dropped for `GET` and `DELETE` requests.
    pub body: Bytes,
}

impl FetchParameters {
    /// Returns `true` if requests with this verb must be sent without a body.
    pub fn is_bodyless(&self) -> bool {
        self.method == Method::GET || self.method == Method::DELETE
    }
}

/// Trait that knows how to encode requests and decode responses for one wire
/// format.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Encode `request` for `method`.
    ///
    /// Errors returned here are contract violations of the request itself;
    /// no network call is made when encoding fails.
    fn encode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        address: &ServiceAddress,
        request: &M,
    ) -> Result<FetchParameters, Status>;

    /// Decode a response body.
    ///
    /// When `ok` is `false` the body is an encoded error, and the decoded
    /// error is returned as `Err`.
    fn decode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        ok: bool,
        body: &[u8],
    ) -> Result<M, Status>;

    /// Decode one element of a streamed response.
    ///
    /// Streams are always framed as a JSON array, so elements are JSON
    /// regardless of the unary body format.
    fn decode_stream_element<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        element: &[u8],
    ) -> Result<M, Status> {
        rest::decode_json(method, element)
    }
}

/// The codec selected by a [`GrpcClient`](crate::GrpcClient) for its
/// [`Protocol`].
#[derive(Clone, Debug)]
pub enum WireCodec {
    /// See [`ProtoCodec`].
    Proto(ProtoCodec),
    /// See [`RestCodec`].
    Rest(RestCodec),
}

impl WireCodec {
    /// The codec for `protocol`.
    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Proto => WireCodec::Proto(ProtoCodec::default()),
            Protocol::Rest => WireCodec::Rest(RestCodec::default()),
        }
    }

    /// The protocol this codec speaks.
    pub fn protocol(&self) -> Protocol {
        match self {
            WireCodec::Proto(_) => Protocol::Proto,
            WireCodec::Rest(_) => Protocol::Rest,
        }
    }
}

impl Codec for WireCodec {
    fn encode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        address: &ServiceAddress,
        request: &M,
    ) -> Result<FetchParameters, Status> {
        match self {
            WireCodec::Proto(codec) => codec.encode(method, address, request),
            WireCodec::Rest(codec) => codec.encode(method, address, request),
        }
    }

    fn decode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        ok: bool,
        body: &[u8],
    ) -> Result<M, Status> {
        match self {
            WireCodec::Proto(codec) => codec.decode(method, ok, body),
            WireCodec::Rest(codec) => codec.decode(method, ok, body),
        }
    }
}
