//! The request lifecycle.
//!
//! [`Dispatcher::handle`] runs one request through a strictly sequential
//! pipeline:
//!
//! 1. run `before_request` hooks;
//! 2. derive URL parts and headers, leaving the body unread;
//! 3. resolve the resource (404 when nothing matches);
//! 4. check the uppercased method against the resource (405 with `Allow`);
//! 5. decode the body with the effective multipart ceiling;
//! 6. build the immutable [`RequestContext`];
//! 7. await the handler;
//! 8. convert its result into the wire response.
//!
//! Every [`HttpError`] raised along the way is turned into a response in one
//! place, after which `after_request` hooks run and the common headers are
//! added.
//!
//! [`RequestContext`]: crate::request::RequestContext

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, Response};
use http_body::Body;
use restdeck_core::{
    BYTES_PER_MEGABYTE, HttpError, RestDeckError, RestDeckResult, Scheme, ServerConfig,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::ResponseBody;
use crate::hooks::{HookChain, LifecycleHook};
use crate::parser::BodyParser;
use crate::registry::ResourceRegistry;
use crate::request::IncomingRequest;
use crate::resource::Resource;
use crate::response::{add_common_headers, error_to_response, into_wire_response};

/// Per-server settings the pipeline reads on every request.
#[derive(Debug)]
struct DispatchSettings {
    scheme: Scheme,
    multipart_memory_mb: u64,
    default_content_type: HeaderValue,
}

/// A failed request: the error plus what the error response needs beyond it.
#[derive(Debug)]
struct Failure {
    error: HttpError,
    allow: Option<HeaderValue>,
}

impl From<HttpError> for Failure {
    fn from(error: HttpError) -> Self {
        Self { error, allow: None }
    }
}

/// Routes requests to resources.
///
/// Cloning is cheap; every clone shares the same frozen registry and hooks.
pub struct Dispatcher {
    registry: Arc<ResourceRegistry>,
    hooks: Arc<HookChain>,
    settings: Arc<DispatchSettings>,
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            hooks: Arc::clone(&self.hooks),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resources", &self.registry.len())
            .field("hooks", &self.hooks)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Dispatcher {
    /// Start building a dispatcher for `config`.
    #[must_use]
    pub fn builder(config: ServerConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            resources: Vec::new(),
            hooks: HookChain::default(),
        }
    }

    /// The frozen registry.
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Dispatch one request and produce its response.
    ///
    /// Never fails: every error becomes an error response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: fmt::Display,
    {
        let request_id = Uuid::new_v4().to_string();
        let incoming = IncomingRequest::new(req, self.settings.scheme);
        let after_head = (!self.hooks.is_empty()).then(|| incoming.head().clone());
        debug!(
            method = %incoming.head().method(),
            path = incoming.head().path(),
            %request_id,
            "dispatching request"
        );

        let mut response = match self.process(incoming, &request_id).await {
            Ok(response) => response,
            Err(Failure { error, allow }) => {
                if error.status_code.is_server_error() {
                    error!(
                        kind = %error.kind,
                        status = error.code(),
                        message = %error.message,
                        %request_id,
                        "request failed"
                    );
                } else {
                    warn!(
                        kind = %error.kind,
                        status = error.code(),
                        message = %error.message,
                        %request_id,
                        "request rejected"
                    );
                }
                let mut response = error_to_response(&error);
                if let Some(allow) = allow {
                    response.headers_mut().insert(http::header::ALLOW, allow);
                }
                response
            }
        };

        if let Some(head) = &after_head {
            self.hooks.run_after(head, &mut response);
        }
        add_common_headers(response, &request_id)
    }

    async fn process<B>(
        &self,
        incoming: IncomingRequest<B>,
        request_id: &str,
    ) -> Result<Response<ResponseBody>, Failure>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: fmt::Display,
    {
        self.hooks.run_before(incoming.head())?;

        let (head, body) = incoming.into_parts();
        let resolved = self
            .registry
            .resolve(head.path())
            .ok_or_else(HttpError::not_found)?;

        let Some(handler) = resolved.resource.handler(head.method()).cloned() else {
            return Err(Failure {
                error: HttpError::method_not_allowed(),
                allow: HeaderValue::from_str(&resolved.resource.allow_header()).ok(),
            });
        };

        info!(
            resource = resolved.resource.name(),
            pattern = %resolved.pattern,
            method = %head.method(),
            request_id,
            "routed request"
        );

        let max_memory = resolved
            .resource
            .multipart_memory_mb()
            .unwrap_or(self.settings.multipart_memory_mb)
            .saturating_mul(BYTES_PER_MEGABYTE);
        let parsed =
            BodyParser::parse(head.content_type(), head.content_length(), body, max_memory).await?;

        let ctx = head.into_context(parsed, resolved.params, resolved.resource);
        let output = handler.call(ctx).await?;
        Ok(into_wire_response(output, &self.settings.default_content_type))
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    config: ServerConfig,
    resources: Vec<Resource>,
    hooks: HookChain,
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("resources", &self.resources)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl DispatcherBuilder {
    /// Register a resource. Registration order is resolution order.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Append a lifecycle hook.
    #[must_use]
    pub fn hook(mut self, hook: impl LifecycleHook) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Validate the configuration, register every resource, and set up hooks.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, duplicate patterns, or a hook whose
    /// setup fails.
    pub fn build(self) -> RestDeckResult<Dispatcher> {
        self.config.validate()?;
        let default_content_type = HeaderValue::from_str(&self.config.default_response_content_type)
            .map_err(|e| RestDeckError::Config(format!("invalid default content type: {e}")))?;

        let mut registry = ResourceRegistry::new();
        for resource in self.resources {
            registry.register(resource)?;
        }
        self.hooks.setup_all()?;

        info!(
            resources = registry.len(),
            hooks = self.hooks.len(),
            multipart_memory_mb = self.config.multipart_memory_mb,
            "dispatcher ready"
        );

        Ok(Dispatcher {
            registry: Arc::new(registry),
            hooks: Arc::new(self.hooks),
            settings: Arc::new(DispatchSettings {
                scheme: self.config.scheme,
                multipart_memory_mb: self.config.multipart_memory_mb,
                default_content_type,
            }),
        })
    }
}
