//! Resource routing, body parsing, and request dispatch for RestDeck.
//!
//! The crate turns a set of declared resources into a running HTTP service:
//!
//! - **Patterns** ([`pattern`]): URI templates such as `/users/:id`, matched
//!   segment by segment with named parameters captured.
//!
//! - **Resources** ([`resource`]): a name, one or more patterns, and a handler
//!   per HTTP method. Handlers receive a [`RequestContext`](request::RequestContext)
//!   and return a [`ResourceResponse`](resource::ResourceResponse).
//!
//! - **Registry** ([`registry`]): resolves a path to the first registered
//!   resource whose pattern matches.
//!
//! - **Body parsing** ([`parser`], [`form`], [`multipart`]): decodes JSON,
//!   URL-encoded, and multipart bodies. Multipart files above the memory
//!   ceiling spill to temporary files.
//!
//! - **Dispatch** ([`dispatch`]): the per-request pipeline from hooks through
//!   routing, parsing, and the handler to the wire response. Every failure is
//!   rendered as an [`HttpError`](restdeck_core::HttpError) response.
//!
//! - **Service / server** ([`service`], [`server`]): the hyper `Service`
//!   adapter and the TCP accept loop with graceful shutdown.
//!
//! # Architecture
//!
//! ```text
//! TCP connection
//!   -> Server (accept loop, hyper-util auto builder)
//!     -> RestDeckService (hyper Service)
//!       -> Dispatcher::handle
//!         -> before_request hooks
//!         -> ResourceRegistry::resolve        (404)
//!         -> method lookup                    (405 + Allow)
//!         -> BodyParser::parse                (400 on decode failure)
//!         -> Handler::call
//!         -> after_request hooks
//!         -> common headers (x-request-id, Server)
//!   <- HTTP response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use restdeck_core::ServerConfig;
//! use restdeck_http::dispatch::Dispatcher;
//! use restdeck_http::request::RequestContext;
//! use restdeck_http::resource::{Resource, ResourceResponse};
//!
//! let hello = Resource::builder("hello")
//!     .path("/hello/:name")
//!     .get(|ctx: RequestContext| async move {
//!         let name = ctx.path_param("name").unwrap_or("world").to_owned();
//!         Ok(ResourceResponse::text(format!("hello {name}")))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder(ServerConfig::default())
//!     .resource(hello)
//!     .build()
//!     .unwrap();
//! // Bind with `restdeck_http::server::Server::bind`.
//! ```

pub mod body;
pub mod dispatch;
pub mod form;
pub mod hooks;
pub mod multipart;
pub mod parser;
pub mod pattern;
pub mod registry;
pub mod request;
pub mod resource;
pub mod response;
pub mod server;
pub mod service;

pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use hooks::LifecycleHook;
pub use parser::ParsedBody;
pub use request::RequestContext;
pub use resource::{Resource, ResourceResponse};
pub use server::{Server, ServerHandle};
pub use service::RestDeckService;
