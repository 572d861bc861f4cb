//! Service and method descriptors.
//!
//! A [`MethodDescriptor`] is the immutable description of one RPC method
//! that the codecs need to build a request: its fully qualified service
//! name, its streaming shape and, for REST, its `google.api.http` rule.
//! Descriptors are usually produced by code generation, or loaded at
//! startup from an encoded `FileDescriptorSet` through a
//! [`DescriptorCache`].

use crate::{pb, Error};
use http::Method;
use prost::Message as _;
use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};
use tracing::{debug, trace};

/// The HTTP mapping of a method, as described by `google.api.HttpRule`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRule {
    method: Method,
    path: String,
    body: Option<String>,
    additional_bindings: Vec<HttpRule>,
}

impl HttpRule {
    /// Create a rule for an arbitrary verb and path template.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        HttpRule {
            method,
            path: path.into(),
            body: None,
            additional_bindings: Vec::new(),
        }
    }

    /// A `GET` rule.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` rule.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `PUT` rule.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A `PATCH` rule.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// A `DELETE` rule.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Map the request field `body` (or `*` for every field not bound by the
    /// path) to the HTTP body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        let body = body.into();
        self.body = (!body.is_empty()).then_some(body);
        self
    }

    /// Add a binding to try when this rule's path variables cannot be
    /// satisfied by the request.
    pub fn with_additional_binding(mut self, binding: HttpRule) -> Self {
        self.additional_bindings.push(binding);
        self
    }

    /// The HTTP verb.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path template, e.g. `/v1/{name=shelves/*}/books`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The body field selector.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// The alternative bindings, in the order they should be tried.
    pub fn additional_bindings(&self) -> &[HttpRule] {
        &self.additional_bindings
    }

    /// This rule followed by its additional bindings.
    pub(crate) fn bindings(&self) -> impl Iterator<Item = &HttpRule> {
        std::iter::once(self).chain(self.additional_bindings.iter())
    }

    fn from_pb(rule: pb::HttpRule) -> Result<Option<HttpRule>, Error> {
        use pb::http_rule::Pattern;

        let (method, path) = match rule.pattern {
            Some(Pattern::Get(path)) => (Method::GET, path),
            Some(Pattern::Put(path)) => (Method::PUT, path),
            Some(Pattern::Post(path)) => (Method::POST, path),
            Some(Pattern::Delete(path)) => (Method::DELETE, path),
            Some(Pattern::Patch(path)) => (Method::PATCH, path),
            Some(Pattern::Custom(custom)) => {
                let method = Method::from_bytes(custom.kind.as_bytes()).map_err(Error::from_source)?;
                (method, custom.path)
            }
            None => return Ok(None),
        };

        let mut additional_bindings = Vec::with_capacity(rule.additional_bindings.len());
        for binding in rule.additional_bindings {
            if let Some(binding) = HttpRule::from_pb(binding)? {
                additional_bindings.push(binding);
            }
        }

        Ok(Some(HttpRule {
            method,
            path,
            body: (!rule.body.is_empty()).then_some(rule.body),
            additional_bindings,
        }))
    }
}

/// The streaming shape of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    /// One request, one response.
    Unary,
    /// One request, a stream of responses.
    ServerStreaming,
    /// A stream of requests, one response. Not supported over HTTP.
    ClientStreaming,
    /// Streams in both directions. Not supported over HTTP.
    BidiStreaming,
}

/// Describes one RPC method of a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    service: String,
    name: String,
    input_type: Option<String>,
    output_type: Option<String>,
    client_streaming: bool,
    server_streaming: bool,
    http: Option<HttpRule>,
}

impl MethodDescriptor {
    /// Describe a method of `service` (fully qualified, e.g.
    /// `google.showcase.v1beta1.Echo`) named `name` in its schema casing.
    pub fn new(
        service: impl Into<String>,
        name: impl Into<String>,
        client_streaming: bool,
        server_streaming: bool,
    ) -> Self {
        MethodDescriptor {
            service: service.into(),
            name: name.into(),
            input_type: None,
            output_type: None,
            client_streaming,
            server_streaming,
            http: None,
        }
    }

    /// Describe a unary method.
    pub fn unary(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(service, name, false, false)
    }

    /// Describe a server streaming method.
    pub fn server_streaming(service: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(service, name, false, true)
    }

    /// Attach the HTTP mapping used by the REST codec.
    pub fn with_http(mut self, rule: HttpRule) -> Self {
        self.http = Some(rule);
        self
    }

    /// Record the fully qualified request and response message names.
    pub fn with_types(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_type = Some(input.into());
        self.output_type = Some(output.into());
        self
    }

    /// The fully qualified service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The method name, in its schema casing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<service>/<method>`, as used in logs and in the `$rpc` path.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }

    /// The fully qualified request message name, when known.
    pub fn input_type(&self) -> Option<&str> {
        self.input_type.as_deref()
    }

    /// The fully qualified response message name, when known.
    pub fn output_type(&self) -> Option<&str> {
        self.output_type.as_deref()
    }

    /// The HTTP mapping, if the schema declares one.
    pub fn http(&self) -> Option<&HttpRule> {
        self.http.as_ref()
    }

    /// The streaming shape of this method.
    pub fn kind(&self) -> MethodKind {
        match (self.client_streaming, self.server_streaming) {
            (false, false) => MethodKind::Unary,
            (false, true) => MethodKind::ServerStreaming,
            (true, false) => MethodKind::ClientStreaming,
            (true, true) => MethodKind::BidiStreaming,
        }
    }
}

/// Describes a service: its methods and the host it is served from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: String,
    default_host: Option<String>,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Create a descriptor for the fully qualified service `name`.
    pub fn new(name: impl Into<String>) -> Self {
        ServiceDescriptor {
            name: name.into(),
            default_host: None,
            methods: Vec::new(),
        }
    }

    /// Set the host declared by `google.api.default_host`.
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    /// Add a method.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// The fully qualified service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The host declared by the schema, if any.
    pub fn default_host(&self) -> Option<&str> {
        self.default_host.as_deref()
    }

    /// All methods, in declaration order.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up a method by its schema name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Decode an encoded `google.protobuf.FileDescriptorSet` and build the
    /// descriptor of the service named `service` (fully qualified).
    pub fn from_file_descriptor_set(bytes: &[u8], service: &str) -> Result<Self, Error> {
        let set = pb::FileDescriptorSet::decode(bytes).map_err(Error::from_source)?;

        for file in set.file {
            let package = file.package.unwrap_or_default();

            for proto in file.service {
                let simple = proto.name.unwrap_or_default();
                let full_name = if package.is_empty() {
                    simple
                } else {
                    format!("{package}.{simple}")
                };

                if full_name != service {
                    continue;
                }

                trace!("found service {} in {:?}", full_name, file.name);

                let mut descriptor = ServiceDescriptor::new(full_name);
                descriptor.default_host = proto
                    .options
                    .and_then(|options| options.default_host)
                    .filter(|host| !host.is_empty());

                for method in proto.method {
                    let http = match method.options.and_then(|options| options.http) {
                        Some(rule) => HttpRule::from_pb(rule)?,
                        None => None,
                    };

                    descriptor.methods.push(MethodDescriptor {
                        service: descriptor.name.clone(),
                        name: method.name.unwrap_or_default(),
                        input_type: method.input_type.map(strip_leading_dot),
                        output_type: method.output_type.map(strip_leading_dot),
                        client_streaming: method.client_streaming.unwrap_or(false),
                        server_streaming: method.server_streaming.unwrap_or(false),
                        http,
                    });
                }

                return Ok(descriptor);
            }
        }

        Err(Error::new(format!(
            "service {service} not found in file descriptor set"
        )))
    }
}

fn strip_leading_dot(name: String) -> String {
    match name.strip_prefix('.') {
        Some(stripped) => stripped.to_owned(),
        None => name,
    }
}

/// A cache of loaded service descriptors.
///
/// The cache is owned by whoever creates it, usually the
/// [`GrpcClient`](crate::GrpcClient), and shared by cloning. Entries are
/// keyed by a hash of the descriptor set bytes together with the service
/// name, so loading the same schema twice decodes it once.
#[derive(Clone, Debug, Default)]
pub struct DescriptorCache {
    entries: Arc<Mutex<HashMap<(u64, String), Arc<ServiceDescriptor>>>>,
}

impl DescriptorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for `service` in `bytes`, decoding and
    /// inserting it on first use.
    pub fn get_or_load(&self, bytes: &[u8], service: &str) -> Result<Arc<ServiceDescriptor>, Error> {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        let key = (hasher.finish(), service.to_owned());

        if let Some(found) = self.lock().get(&key) {
            trace!("descriptor cache hit for {service}");
            return Ok(found.clone());
        }

        let descriptor = Arc::new(ServiceDescriptor::from_file_descriptor_set(bytes, service)?);
        debug!("loaded descriptor for {service}");

        Ok(self.lock().entry(key).or_insert(descriptor).clone())
    }

    /// The number of cached descriptors.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been loaded yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every cached descriptor.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(u64, String), Arc<ServiceDescriptor>>> {
        // The map is never left half-updated, so a poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
