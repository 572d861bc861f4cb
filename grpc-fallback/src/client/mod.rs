//! Service stubs and the client that creates them.
//!
//! A [`GrpcClient`] is configured once per application with a transport, a
//! wire [`Protocol`](crate::Protocol) and credentials. It turns service
//! descriptors into [`ServiceStub`]s, and each stub call encodes the request,
//! merges headers, sends it, and decodes the response.
//!
//! Every call can be cancelled through a [`Cancelable`]. A cancelled call
//! resolves to a [`Status`](crate::Status) for which
//! [`is_abort`](crate::Status::is_abort) is `true`, so callers can tell it
//! apart from a real failure.

mod cancel;
mod grpc;
mod options;
mod stub;

pub use self::cancel::{Call, Cancelable};
pub use self::grpc::{GrpcClient, GrpcClientBuilder};
pub use self::options::{CallOptions, StubOptions};
pub use self::stub::{ServiceStub, StreamingCall, UnaryCall, UnaryMethod};
