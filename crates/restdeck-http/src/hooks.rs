//! Before/after-request hooks.
//!
//! Hooks are registered on the dispatcher in order. `setup` runs once when the
//! dispatcher is built, `before_request` runs before resolution and may reject
//! the request, and `after_request` sees every response, error responses
//! included, just before it is returned to the listener.

use std::fmt;
use std::sync::Arc;

use http::Response;
use restdeck_core::{HttpError, HttpErrorKind, RestDeckResult};

use crate::body::ResponseBody;
use crate::request::RequestHead;

/// A service invoked around every dispatched request.
pub trait LifecycleHook: Send + Sync + 'static {
    /// Name used in logs and setup errors.
    fn name(&self) -> &str;

    /// One-time initialisation.
    fn setup(&self) -> RestDeckResult<()> {
        Ok(())
    }

    /// Inspect the request before it is resolved. An error ends the request
    /// with that error's status.
    fn before_request(&self, _head: &RequestHead) -> Result<(), HttpError> {
        Ok(())
    }

    /// Inspect or amend the outgoing response.
    fn after_request(&self, _head: &RequestHead, _response: &mut Response<ResponseBody>) {}
}

/// Hooks in registration order.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

impl HookChain {
    /// Append a hook.
    pub fn push(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    /// Number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook's `setup`, stopping at the first failure.
    pub fn setup_all(&self) -> RestDeckResult<()> {
        self.hooks.iter().try_for_each(|hook| hook.setup())
    }

    /// Run `before_request` hooks in order, stopping at the first rejection.
    ///
    /// Rejections raised with [`HttpError::status`] are reported as
    /// [`HttpErrorKind::Hook`].
    pub fn run_before(&self, head: &RequestHead) -> Result<(), HttpError> {
        for hook in &self.hooks {
            hook.before_request(head).map_err(|err| {
                if err.kind == HttpErrorKind::Handler {
                    err.with_kind(HttpErrorKind::Hook)
                } else {
                    err
                }
            })?;
        }
        Ok(())
    }

    /// Run every `after_request` hook in order.
    pub fn run_after(&self, head: &RequestHead, response: &mut Response<ResponseBody>) {
        for hook in &self.hooks {
            hook.after_request(head, response);
        }
    }
}
