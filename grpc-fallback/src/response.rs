use http::HeaderMap;

/// The message decoded from a successful call, along with the HTTP headers
/// of the response that carried it.
#[derive(Debug)]
pub struct Response<T> {
    metadata: HeaderMap,
    message: T,
}

impl<T> Response<T> {
    /// Wrap `message` with no headers attached.
    pub fn new(message: T) -> Self {
        Response::from_parts(HeaderMap::new(), message)
    }

    /// The decoded message.
    pub fn get_ref(&self) -> &T {
        &self.message
    }

    /// The decoded message, mutably.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.message
    }

    /// Headers of the HTTP response.
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Drop the headers and keep the message.
    pub fn into_inner(self) -> T {
        self.message
    }

    /// Split into headers and message.
    pub fn into_parts(self) -> (HeaderMap, T) {
        (self.metadata, self.message)
    }

    pub(crate) fn from_parts(metadata: HeaderMap, message: T) -> Self {
        Response { metadata, message }
    }
}
