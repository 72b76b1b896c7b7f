//! Resources: URI patterns bundled with per-method handlers.
//!
//! A [`Resource`] is declared once at start-up with [`Resource::builder`] and
//! is immutable afterwards. Method dispatch is a key lookup into the
//! resource's handler map.
//!
//! ```rust
//! use restdeck_http::resource::{Resource, ResourceResponse};
//! use restdeck_http::request::RequestContext;
//! use restdeck_core::HttpError;
//!
//! async fn show_user(ctx: RequestContext) -> Result<ResourceResponse, HttpError> {
//!     let id = ctx.path_param("id").unwrap_or_default();
//!     ResourceResponse::json(&serde_json::json!({ "id": id }))
//! }
//!
//! let users = Resource::builder("users")
//!     .path("/users/:id")
//!     .get(show_user)
//!     .build()
//!     .unwrap();
//! assert!(users.allows(&http::Method::GET));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use restdeck_core::{HttpError, RestDeckError, RestDeckResult};

use crate::pattern::UriPattern;
use crate::request::RequestContext;

/// Boxed future returned by a [`Handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ResourceResponse, HttpError>> + Send>>;

/// A method handler of a resource.
///
/// Implemented for every `Fn(RequestContext) -> impl Future<Output =
/// Result<ResourceResponse, HttpError>>`, so plain `async fn`s work directly.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn call(&self, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ResourceResponse, HttpError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext) -> HandlerFuture {
        Box::pin(self(ctx))
    }
}

/// Result of a handler: status, headers, and body bytes.
#[derive(Debug, Clone, Default)]
pub struct ResourceResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl ResourceResponse {
    /// An empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// An empty `200 OK`.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// A `200 OK` carrying `value` as JSON.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `value` cannot be serialized.
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| HttpError::internal(format!("failed to serialize response: {e}")))?;
        Ok(Self::ok()
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .with_body(body))
    }

    /// A `200 OK` carrying UTF-8 text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok()
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
            .with_body(text.into())
    }

    /// Replace the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A named set of URI patterns with a handler per HTTP method.
pub struct Resource {
    name: String,
    patterns: Vec<UriPattern>,
    handlers: HashMap<Method, Arc<dyn Handler>>,
    multipart_memory_mb: Option<u64>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("methods", &self.method_names())
            .field("multipart_memory_mb", &self.multipart_memory_mb)
            .finish()
    }
}

impl Resource {
    /// Start declaring a resource.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            name: name.into(),
            paths: Vec::new(),
            handlers: Vec::new(),
            multipart_memory_mb: None,
        }
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The URI patterns, in declaration order.
    #[must_use]
    pub fn patterns(&self) -> &[UriPattern] {
        &self.patterns
    }

    /// The handler for `method`, if declared.
    #[must_use]
    pub fn handler(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(method)
    }

    /// Whether `method` is declared.
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.handlers.contains_key(method)
    }

    /// Declared method names, sorted.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(Method::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Value for an `Allow` header listing the declared methods.
    #[must_use]
    pub fn allow_header(&self) -> String {
        self.method_names().join(", ")
    }

    /// Per-resource multipart memory ceiling in megabytes, if overridden.
    #[must_use]
    pub fn multipart_memory_mb(&self) -> Option<u64> {
        self.multipart_memory_mb
    }
}

/// Builder for [`Resource`].
pub struct ResourceBuilder {
    name: String,
    paths: Vec<String>,
    handlers: Vec<(Method, Arc<dyn Handler>)>,
    multipart_memory_mb: Option<u64>,
}

impl fmt::Debug for ResourceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBuilder")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .field(
                "methods",
                &self.handlers.iter().map(|(m, _)| m).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ResourceBuilder {
    /// Add a URI pattern.
    #[must_use]
    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.paths.push(pattern.into());
        self
    }

    /// Add several URI patterns.
    #[must_use]
    pub fn paths<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Declare a handler for `method`.
    #[must_use]
    pub fn method(mut self, method: Method, handler: impl Handler) -> Self {
        self.handlers
            .push((normalize_method(&method), Arc::new(handler)));
        self
    }

    /// Declare a `GET` handler.
    #[must_use]
    pub fn get(self, handler: impl Handler) -> Self {
        self.method(Method::GET, handler)
    }

    /// Declare a `POST` handler.
    #[must_use]
    pub fn post(self, handler: impl Handler) -> Self {
        self.method(Method::POST, handler)
    }

    /// Declare a `PUT` handler.
    #[must_use]
    pub fn put(self, handler: impl Handler) -> Self {
        self.method(Method::PUT, handler)
    }

    /// Declare a `PATCH` handler.
    #[must_use]
    pub fn patch(self, handler: impl Handler) -> Self {
        self.method(Method::PATCH, handler)
    }

    /// Declare a `DELETE` handler.
    #[must_use]
    pub fn delete(self, handler: impl Handler) -> Self {
        self.method(Method::DELETE, handler)
    }

    /// Override the server's multipart memory ceiling for this resource.
    #[must_use]
    pub fn multipart_memory_mb(mut self, megabytes: u64) -> Self {
        self.multipart_memory_mb = Some(megabytes);
        self
    }

    /// Validate and freeze the resource.
    ///
    /// # Errors
    ///
    /// Fails on an unparsable or repeated pattern, a method declared twice, a
    /// resource with no patterns or no methods, or a zero multipart ceiling.
    pub fn build(self) -> RestDeckResult<Resource> {
        if self.paths.is_empty() {
            return Err(RestDeckError::Config(format!(
                "resource `{}` declares no URI patterns",
                self.name
            )));
        }
        if self.handlers.is_empty() {
            return Err(RestDeckError::Config(format!(
                "resource `{}` declares no methods",
                self.name
            )));
        }
        if self.multipart_memory_mb == Some(0) {
            return Err(RestDeckError::Config(format!(
                "resource `{}` sets a zero multipart memory ceiling",
                self.name
            )));
        }

        let mut patterns: Vec<UriPattern> = Vec::with_capacity(self.paths.len());
        for raw in &self.paths {
            let pattern = UriPattern::parse(raw)?;
            if let Some(existing) = patterns.iter().find(|p| p.same_template(&pattern)) {
                return Err(RestDeckError::DuplicatePattern {
                    pattern: existing.as_str().to_owned(),
                    existing: self.name.clone(),
                    duplicate: self.name.clone(),
                });
            }
            patterns.push(pattern);
        }

        let mut handlers = HashMap::with_capacity(self.handlers.len());
        for (method, handler) in self.handlers {
            if handlers.insert(method.clone(), handler).is_some() {
                return Err(RestDeckError::Config(format!(
                    "resource `{}` declares {method} twice",
                    self.name
                )));
            }
        }

        Ok(Resource {
            name: self.name,
            patterns,
            handlers,
            multipart_memory_mb: self.multipart_memory_mb,
        })
    }
}

/// Uppercase a method so `get` and `GET` address the same handler.
#[must_use]
pub fn normalize_method(method: &Method) -> Method {
    let upper = method.as_str().to_ascii_uppercase();
    if upper == method.as_str() {
        return method.clone();
    }
    Method::from_bytes(upper.as_bytes()).unwrap_or_else(|_| method.clone())
}
