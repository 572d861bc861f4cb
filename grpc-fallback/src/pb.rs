//! Protobuf messages used on the wire by the fallback protocols.
//!
//! These mirror the subset of `google/rpc/status.proto`,
//! `google/rpc/error_details.proto`, `google/api/http.proto` and
//! `google/protobuf/descriptor.proto` that the codecs and the descriptor
//! loader need. The `google.rpc` detail types also derive `serde` so they can
//! be read out of REST error bodies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `Status` type defines a logical error model, used as the body of a
/// failed proto-over-HTTP response.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Status {
    /// The status code, which should be an enum value of `google.rpc.Code`.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// A developer-facing error message.
    #[prost(string, tag = "2")]
    pub message: String,
    /// A list of messages that carry the error details.
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

/// Describes the cause of the error with structured details.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorInfo {
    /// The reason of the error, a constant within `domain`.
    #[prost(string, tag = "1")]
    pub reason: String,
    /// The logical grouping to which the `reason` belongs.
    #[prost(string, tag = "2")]
    pub domain: String,
    /// Additional structured details about this error.
    #[prost(map = "string, string", tag = "3")]
    pub metadata: HashMap<String, String>,
}

impl ErrorInfo {
    /// Type URL of the `ErrorInfo` standard error message type.
    pub const TYPE_URL: &'static str = "type.googleapis.com/google.rpc.ErrorInfo";
}

/// Describes violations in a client request.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BadRequest {
    /// Describes all violations in a client request.
    #[prost(message, repeated, tag = "1")]
    pub field_violations: Vec<bad_request::FieldViolation>,
}

impl BadRequest {
    /// Type URL of the `BadRequest` standard error message type.
    pub const TYPE_URL: &'static str = "type.googleapis.com/google.rpc.BadRequest";
}

/// Nested message and enum types in `BadRequest`.
pub mod bad_request {
    use serde::{Deserialize, Serialize};

    /// A message type used to describe a single bad request field.
    #[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct FieldViolation {
        /// A path that leads to a field in the request body.
        #[prost(string, tag = "1")]
        pub field: String,
        /// A description of why the request element is bad.
        #[prost(string, tag = "2")]
        pub description: String,
    }
}

/// Defines the HTTP mapping of an RPC method (`google.api.HttpRule`).
#[derive(Clone, PartialEq, prost::Message)]
pub struct HttpRule {
    /// Selects a method to which this rule applies.
    #[prost(string, tag = "1")]
    pub selector: String,
    /// The name of the request field whose value is mapped to the HTTP body.
    #[prost(string, tag = "7")]
    pub body: String,
    /// The name of the response field whose value is mapped to the HTTP
    /// response body.
    #[prost(string, tag = "12")]
    pub response_body: String,
    /// Additional HTTP bindings for the selector.
    #[prost(message, repeated, tag = "11")]
    pub additional_bindings: Vec<HttpRule>,
    /// Determines the URL pattern matched by this rule.
    #[prost(oneof = "http_rule::Pattern", tags = "2, 3, 4, 5, 6, 8")]
    pub pattern: Option<http_rule::Pattern>,
}

/// Nested message and enum types in `HttpRule`.
pub mod http_rule {
    /// Determines the URL pattern matched by this rule.
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Pattern {
        /// Maps to HTTP GET.
        #[prost(string, tag = "2")]
        Get(String),
        /// Maps to HTTP PUT.
        #[prost(string, tag = "3")]
        Put(String),
        /// Maps to HTTP POST.
        #[prost(string, tag = "4")]
        Post(String),
        /// Maps to HTTP DELETE.
        #[prost(string, tag = "5")]
        Delete(String),
        /// Maps to HTTP PATCH.
        #[prost(string, tag = "6")]
        Patch(String),
        /// A custom pattern for verbs not covered above.
        #[prost(message, tag = "8")]
        Custom(super::CustomHttpPattern),
    }
}

/// A custom pattern is used for defining custom HTTP verb.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CustomHttpPattern {
    /// The name of this custom HTTP verb.
    #[prost(string, tag = "1")]
    pub kind: String,
    /// The path matched by this custom verb.
    #[prost(string, tag = "2")]
    pub path: String,
}

/// The protocol compiler can output a `FileDescriptorSet` containing the
/// `.proto` files it parses.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FileDescriptorSet {
    /// The files in the set.
    #[prost(message, repeated, tag = "1")]
    pub file: Vec<FileDescriptorProto>,
}

/// Describes a complete `.proto` file. Only the fields needed to build
/// service descriptors are decoded.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FileDescriptorProto {
    /// File name, relative to the root of the source tree.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// The protobuf package, e.g. `google.showcase.v1beta1`.
    #[prost(string, optional, tag = "2")]
    pub package: Option<String>,
    /// Services declared in this file.
    #[prost(message, repeated, tag = "6")]
    pub service: Vec<ServiceDescriptorProto>,
}

/// Describes a service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceDescriptorProto {
    /// The simple name of the service.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// The methods of the service.
    #[prost(message, repeated, tag = "2")]
    pub method: Vec<MethodDescriptorProto>,
    /// Service options, including the `google.api` extensions.
    #[prost(message, optional, tag = "3")]
    pub options: Option<ServiceOptions>,
}

/// Describes a method of a service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MethodDescriptorProto {
    /// The simple name of the method.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// Fully qualified name of the input type.
    #[prost(string, optional, tag = "2")]
    pub input_type: Option<String>,
    /// Fully qualified name of the output type.
    #[prost(string, optional, tag = "3")]
    pub output_type: Option<String>,
    /// Method options, including the `google.api.http` extension.
    #[prost(message, optional, tag = "4")]
    pub options: Option<MethodOptions>,
    /// Identifies if client streams multiple client messages.
    #[prost(bool, optional, tag = "5")]
    pub client_streaming: Option<bool>,
    /// Identifies if server streams multiple server messages.
    #[prost(bool, optional, tag = "6")]
    pub server_streaming: Option<bool>,
}

/// `google.protobuf.ServiceOptions`, decoding only the `google.api`
/// extensions.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceOptions {
    /// `google.api.default_host`.
    #[prost(string, optional, tag = "1049")]
    pub default_host: Option<String>,
    /// `google.api.oauth_scopes`.
    #[prost(string, optional, tag = "1050")]
    pub oauth_scopes: Option<String>,
}

/// `google.protobuf.MethodOptions`, decoding only the `google.api.http`
/// extension.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MethodOptions {
    /// `google.api.http`.
    #[prost(message, optional, tag = "72295728")]
    pub http: Option<HttpRule>,
}
