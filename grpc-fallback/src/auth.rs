//! Credential suppliers.
//!
//! The stub never inspects or refreshes tokens itself. Before every call it
//! asks its [`CredentialSupplier`] for a fresh set of request headers and
//! layers the call's own headers on top of them.

use crate::BoxError;
use async_trait::async_trait;
use http::HeaderMap;
use std::fmt;

/// Supplies authentication headers for outgoing requests.
#[async_trait]
pub trait CredentialSupplier: Send + Sync + 'static {
    /// Resolve the headers to attach to the next request, typically an
    /// `authorization` header carrying a fresh access token.
    async fn request_headers(&self) -> Result<HeaderMap, BoxError>;
}

/// A supplier that adds no headers, for services that accept anonymous calls
/// or for local emulators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialSupplier for NoCredentials {
    async fn request_headers(&self) -> Result<HeaderMap, BoxError> {
        Ok(HeaderMap::new())
    }
}

/// A supplier that returns the same headers on every call, such as an API key
/// header.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    headers: HeaderMap,
}

impl StaticCredentials {
    /// Create a supplier that always returns `headers`.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl CredentialSupplier for StaticCredentials {
    async fn request_headers(&self) -> Result<HeaderMap, BoxError> {
        Ok(self.headers.clone())
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values are usually secrets.
        f.debug_struct("StaticCredentials")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}
