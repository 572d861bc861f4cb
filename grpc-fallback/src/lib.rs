//! A gRPC client fallback that speaks plain HTTP.
//!
//! `grpc-fallback` lets generated service clients call methods described by a
//! protobuf service definition in environments where a native gRPC stack is
//! not available. Two wire formats are supported:
//!
//! - **proto**: the binary encoded request is `POST`ed to
//!   `/$rpc/<package.Service>/<Method>` with `Content-Type:
//!   application/x-protobuf`, and errors come back as an encoded
//!   `google.rpc.Status`.
//! - **rest**: the request is converted to its proto3 JSON form and transcoded
//!   into an HTTP verb, path, query and body using the `google.api.http`
//!   rule attached to the method. Errors come back as a JSON error object.
//!
//! Server streaming methods are delivered as a JSON array which is decoded
//! incrementally by [`codec::StreamArrayParser`] as bytes arrive.
//!
//! # Structure
//!
//! - [`client`] holds the [`GrpcClient`](client::GrpcClient), which owns the
//!   credentials and wire format selection, and the
//!   [`ServiceStub`](client::ServiceStub) it produces for a service.
//! - [`codec`] holds the two wire codecs and the streaming parser.
//! - [`paginate`] layers page token driven iteration over any unary call.
//! - [`transport`] is the pluggable HTTP capability used to send requests.
//!
//! # Feature flags
//!
//! - `transport`: Enables [`transport::HyperTransport`], a default HTTP
//!   transport backed by `hyper-util`. Enabled by default.

#![doc(issue_tracker_base_url = "https://github.com/grpc-fallback/grpc-fallback/issues/")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod auth;
pub mod client;
pub mod codec;
pub mod descriptor;
pub mod paginate;
pub mod pb;
pub mod transport;

mod body;
mod error;
mod response;
mod status;

pub use body::BoxBody;
pub use error::{BoxError, Error};
pub use response::Response;
pub use status::{Code, ErrorDetail, Status};

pub use client::{Cancelable, GrpcClient, ServiceStub};
pub use codec::{Protocol, RpcMessage};
pub use descriptor::{HttpRule, MethodDescriptor, ServiceDescriptor};

/// Version of this crate, reported in the `x-goog-api-client` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
