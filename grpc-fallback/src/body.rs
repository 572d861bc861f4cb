use crate::Status;
use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;

/// A type-erased response body, as handed to the codecs and the stream parser.
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, Status>;

/// Convert a transport specific body into a [`BoxBody`].
pub(crate) fn boxed<B>(body: B) -> BoxBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<crate::BoxError>,
{
    body.map_err(|err| Status::from_transport_error(err.into()))
        .boxed_unsync()
}

/// Buffer the whole body, used by unary calls and error responses.
pub(crate) async fn collect(body: BoxBody) -> Result<Bytes, Status> {
    Ok(body.collect().await?.to_bytes())
}

/// A body with no data, left behind when a stream is cancelled.
pub(crate) fn empty() -> BoxBody {
    http_body_util::Empty::new()
        .map_err(|err| match err {})
        .boxed_unsync()
}
