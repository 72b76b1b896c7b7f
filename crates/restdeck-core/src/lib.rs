//! Core configuration and error types for RestDeck.
//!
//! This crate holds the pieces shared by the HTTP layer and the server binary:
//! the server configuration loaded from the environment, start-up
//! configuration errors, and the [`HttpError`] value that every request-time
//! failure is funnelled into.

mod config;
mod error;
mod http_error;

pub use config::{BYTES_PER_MEGABYTE, Scheme, ServerConfig};
pub use error::{RestDeckError, RestDeckResult};
pub use http_error::{HttpError, HttpErrorKind};
