use super::{ServiceStub, StubOptions};
use crate::{
    auth::{CredentialSupplier, NoCredentials},
    codec::{Protocol, ServiceAddress, WireCodec},
    descriptor::DescriptorCache,
    transport::HttpTransport,
    Error, ServiceDescriptor, VERSION,
};
use http::{
    header::{HeaderName, USER_AGENT},
    HeaderMap, HeaderValue, Uri,
};
use std::{fmt, sync::Arc};
use tracing::debug;

const X_GOOG_API_CLIENT: HeaderName = HeaderName::from_static("x-goog-api-client");

/// Owns what every stub of an application shares: the transport, the wire
/// format, credentials, and the descriptor cache.
///
/// ```rust,no_run
/// # use grpc_fallback::{GrpcClient, Protocol, ServiceDescriptor};
/// # use grpc_fallback::client::StubOptions;
/// # fn run(descriptor: ServiceDescriptor) -> Result<(), grpc_fallback::Error> {
/// let client = GrpcClient::builder()
///     .protocol(Protocol::Rest)
///     .scheme("http")
///     .build()?;
///
/// let stub = client.create_stub(descriptor, StubOptions::new().service_path("localhost"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GrpcClient<T> {
    transport: T,
    codec: WireCodec,
    credentials: Arc<dyn CredentialSupplier>,
    scheme: String,
    port: u16,
    user_agent: Option<HeaderValue>,
    cache: DescriptorCache,
}

#[cfg(feature = "transport")]
impl GrpcClient<crate::transport::HyperTransport> {
    /// A builder using the default [`HyperTransport`](crate::transport::HyperTransport).
    pub fn builder() -> GrpcClientBuilder<crate::transport::HyperTransport> {
        GrpcClientBuilder::new(crate::transport::HyperTransport::new())
    }
}

impl<T: HttpTransport> GrpcClient<T> {
    /// The wire format of every stub this client creates.
    pub fn protocol(&self) -> Protocol {
        self.codec.protocol()
    }

    /// The cache used by [`load_service`](GrpcClient::load_service).
    pub fn descriptor_cache(&self) -> &DescriptorCache {
        &self.cache
    }

    /// Load the descriptor of `service` from an encoded
    /// `google.protobuf.FileDescriptorSet`, reusing a cached copy when the
    /// same schema was loaded before.
    pub fn load_service(&self, descriptor_set: &[u8], service: &str) -> Result<Arc<ServiceDescriptor>, Error> {
        self.cache.get_or_load(descriptor_set, service)
    }

    /// Create a stub for `descriptor`.
    ///
    /// The host is the service path of `options`, or else the default host
    /// declared by the service. A `host:port` default host also sets the
    /// port, unless `options` overrides it. Having no host at all is an
    /// error.
    pub fn create_stub(
        &self,
        descriptor: impl Into<Arc<ServiceDescriptor>>,
        options: StubOptions,
    ) -> Result<ServiceStub<T>, Error> {
        let descriptor = descriptor.into();

        let host = options
            .service_path
            .as_deref()
            .or(descriptor.default_host())
            .filter(|host| !host.is_empty())
            .ok_or_else(|| {
                Error::new(format!(
                    "no host for {}: set a service path or declare a default host",
                    descriptor.name()
                ))
            })?;
        let (host, host_port) = split_host_port(host);
        let port = options.port.or(host_port).unwrap_or(self.port);
        let scheme = options.scheme.as_deref().unwrap_or(&self.scheme);
        let address = ServiceAddress::new(scheme, host, port);

        // Catch a malformed host now rather than on every call.
        address
            .base_url()
            .parse::<Uri>()
            .map_err(Error::from_source)?;

        let mut headers = HeaderMap::new();
        headers.insert(X_GOOG_API_CLIENT, api_client_header(self.protocol())?);
        if let Some(user_agent) = &self.user_agent {
            headers.insert(USER_AGENT, user_agent.clone());
        }
        for (name, value) in &options.headers {
            headers.append(name, value.clone());
        }

        debug!(
            "created {} stub for {} at {}",
            self.protocol(),
            descriptor.name(),
            address.base_url()
        );

        Ok(ServiceStub::new(
            descriptor,
            self.transport.clone(),
            self.codec.clone(),
            self.credentials.clone(),
            address,
            headers,
        ))
    }
}

fn split_host_port(host: &str) -> (&str, Option<u16>) {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && !name.ends_with(':') => match port.parse() {
            Ok(port) => (name, Some(port)),
            Err(_) => (host, None),
        },
        _ => (host, None),
    }
}

fn api_client_header(protocol: Protocol) -> Result<HeaderValue, Error> {
    let value = match protocol {
        Protocol::Proto => format!("grpc-fallback/{VERSION}"),
        Protocol::Rest => format!("grpc-fallback/{VERSION} rest/{VERSION}"),
    };
    HeaderValue::try_from(value).map_err(Error::from_source)
}

impl<T: fmt::Debug> fmt::Debug for GrpcClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcClient")
            .field("transport", &self.transport)
            .field("protocol", &self.codec.protocol())
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("user_agent", &self.user_agent)
            .field("cached_descriptors", &self.cache.len())
            .finish()
    }
}

/// Configures a [`GrpcClient`].
pub struct GrpcClientBuilder<T> {
    transport: T,
    protocol: Protocol,
    credentials: Arc<dyn CredentialSupplier>,
    scheme: String,
    port: u16,
    user_agent: Option<HeaderValue>,
    cache: DescriptorCache,
}

impl<T: HttpTransport> GrpcClientBuilder<T> {
    /// A builder sending requests through `transport`, speaking
    /// [`Protocol::Proto`] over `https` on port 443, without credentials.
    pub fn new(transport: T) -> Self {
        GrpcClientBuilder {
            transport,
            protocol: Protocol::default(),
            credentials: Arc::new(NoCredentials),
            scheme: "https".to_owned(),
            port: 443,
            user_agent: None,
            cache: DescriptorCache::new(),
        }
    }

    /// Use another transport.
    pub fn transport<U: HttpTransport>(self, transport: U) -> GrpcClientBuilder<U> {
        GrpcClientBuilder {
            transport,
            protocol: self.protocol,
            credentials: self.credentials,
            scheme: self.scheme,
            port: self.port,
            user_agent: self.user_agent,
            cache: self.cache,
        }
    }

    /// Select the wire format.
    pub fn protocol(self, protocol: Protocol) -> Self {
        GrpcClientBuilder { protocol, ..self }
    }

    /// Supply credential headers for every call.
    pub fn credentials(self, credentials: impl CredentialSupplier) -> Self {
        GrpcClientBuilder {
            credentials: Arc::new(credentials),
            ..self
        }
    }

    /// The URL scheme, `http` or `https`.
    pub fn scheme(self, scheme: impl Into<String>) -> Self {
        GrpcClientBuilder {
            scheme: scheme.into(),
            ..self
        }
    }

    /// The port used when neither the stub options nor the service's default
    /// host name one.
    pub fn port(self, port: u16) -> Self {
        GrpcClientBuilder { port, ..self }
    }

    /// Set a custom user-agent header.
    ///
    /// `user_agent` will be sent as the `user-agent` header of every call.
    pub fn user_agent<V>(self, user_agent: V) -> Result<Self, Error>
    where
        V: TryInto<HeaderValue>,
    {
        user_agent
            .try_into()
            .map(|user_agent| GrpcClientBuilder {
                user_agent: Some(user_agent),
                ..self
            })
            .map_err(|_| Error::new("invalid user agent"))
    }

    /// Share a descriptor cache with other clients.
    pub fn descriptor_cache(self, cache: DescriptorCache) -> Self {
        GrpcClientBuilder { cache, ..self }
    }

    /// Validate the configuration and create the client.
    pub fn build(self) -> Result<GrpcClient<T>, Error> {
        if !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(Error::new(format!("unsupported scheme {:?}", self.scheme)));
        }

        Ok(GrpcClient {
            transport: self.transport,
            codec: WireCodec::for_protocol(self.protocol),
            credentials: self.credentials,
            scheme: self.scheme,
            port: self.port,
            user_agent: self.user_agent,
            cache: self.cache,
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for GrpcClientBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcClientBuilder")
            .field("transport", &self.transport)
            .field("protocol", &self.protocol)
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .finish()
    }
}
