//! The ordered pattern index.
//!
//! Patterns are tried in registration order and the first match wins. The
//! registry never scores or sorts patterns, so a literal such as `/users/new`
//! must be registered before a parameterized `/users/:id` that would also
//! match it.

use std::sync::Arc;

use restdeck_core::{RestDeckError, RestDeckResult};
use tracing::debug;

use crate::pattern::{PathParams, UriPattern};
use crate::resource::Resource;

/// Outcome of a successful [`ResourceRegistry::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    /// The matched resource.
    pub resource: Arc<Resource>,
    /// The pattern that matched.
    pub pattern: UriPattern,
    /// Parameters captured from the path.
    pub params: PathParams,
}

/// Registered resources and their patterns in registration order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Arc<Resource>>,
    /// `(pattern, index into resources)`.
    index: Vec<(UriPattern, usize)>,
}

impl ResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource and append its patterns to the index.
    ///
    /// Nothing is added if the call fails.
    ///
    /// # Errors
    ///
    /// Returns [`RestDeckError::DuplicatePattern`] when another resource
    /// already owns an identical pattern.
    pub fn register(&mut self, resource: Resource) -> RestDeckResult<()> {
        for pattern in resource.patterns() {
            if let Some((existing, owner)) = self
                .index
                .iter()
                .find(|(existing, _)| existing.same_template(pattern))
            {
                return Err(RestDeckError::DuplicatePattern {
                    pattern: existing.as_str().to_owned(),
                    existing: self.resources[*owner].name().to_owned(),
                    duplicate: resource.name().to_owned(),
                });
            }
        }

        let slot = self.resources.len();
        for pattern in resource.patterns() {
            debug!(resource = resource.name(), pattern = %pattern, "registering pattern");
            self.index.push((pattern.clone(), slot));
        }
        self.resources.push(Arc::new(resource));
        Ok(())
    }

    /// Find the first pattern matching `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<ResolvedResource> {
        self.index.iter().find_map(|(pattern, slot)| {
            pattern.matches(path).map(|params| ResolvedResource {
                resource: Arc::clone(&self.resources[*slot]),
                pattern: pattern.clone(),
                params,
            })
        })
    }

    /// Registered resources in registration order.
    #[must_use]
    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resource is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
