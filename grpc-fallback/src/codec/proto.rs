use super::{Codec, FetchParameters, RpcMessage, ServiceAddress};
use crate::{pb, Code, MethodDescriptor, Status};
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Method};
use prost::Message as _;
use tracing::debug;

const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";

/// A [`Codec`] that posts binary protobuf bodies to
/// `/$rpc/<service>/<Method>`, and reads failures as an encoded
/// `google.rpc.Status`.
#[derive(Debug, Clone, Default)]
pub struct ProtoCodec {
    _priv: (),
}

impl ProtoCodec {
    /// Create a proto codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for ProtoCodec {
    fn encode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        address: &ServiceAddress,
        request: &M,
    ) -> Result<FetchParameters, Status> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_PROTOBUF));

        // The method keeps its schema casing here.
        let url = format!(
            "{}/$rpc/{}/{}",
            address.base_url(),
            method.service(),
            method.name()
        );

        Ok(FetchParameters {
            method: Method::POST,
            url,
            headers,
            body: Bytes::from(request.encode_to_vec()),
        })
    }

    fn decode<M: RpcMessage>(
        &self,
        method: &MethodDescriptor,
        ok: bool,
        body: &[u8],
    ) -> Result<M, Status> {
        if !ok {
            let rpc = pb::Status::decode(body).map_err(|err| {
                debug!("{}: undecodable error status: {}", method.full_name(), err);
                Status::new(
                    Code::Internal,
                    format!("failed to decode error status of {}: {err}", method.full_name()),
                )
            })?;
            return Err(Status::from_rpc_status(rpc));
        }

        // Map Protobuf parse errors to an INTERNAL status code, as per
        // https://github.com/grpc/grpc/blob/master/doc/statuscodes.md
        M::decode(body).map_err(|err| {
            Status::new(
                Code::Internal,
                format!("failed to decode response of {}: {err}", method.full_name()),
            )
        })
    }
}
