//! Collaborator mounting and dispatch.
//!
//! # Responsibilities
//! - Validate collaborator prefixes
//! - Keep built-in paths reserved
//! - Nest every collaborator router under its prefix
//!
//! # Design Decisions
//! - Immutable after `into_router` (thread-safe without locks)
//! - Prefixes are literal paths: no captures, no wildcards
//! - Overlap is judged per path segment, so `/api/auth` and `/api/authz` coexist
//! - Explicit error rather than a silently shadowed route

use axum::Router;
use thiserror::Error;

use crate::health::HEALTH_PATH;
use crate::http::response::not_found;
use crate::routing::collaborator::Collaborator;
use crate::store::StoreHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("invalid mount prefix {0:?}: must start with '/', contain no captures and not end with '/'")]
    InvalidPrefix(String),

    #[error("mount prefix {prefix:?} overlaps {existing:?}")]
    Overlap { prefix: String, existing: String },
}

/// Ordered set of collaborators waiting to be mounted.
pub struct Dispatch {
    mounts: Vec<Box<dyn Collaborator>>,
    reserved: Vec<String>,
}

impl Default for Dispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch {
    /// An empty dispatch with the health paths reserved.
    pub fn new() -> Self {
        Self {
            mounts: Vec::new(),
            reserved: vec![HEALTH_PATH.to_string()],
        }
    }

    /// Mount a collaborator under its own prefix.
    pub fn mount<C>(mut self, collaborator: C) -> Result<Self, RoutingError>
    where
        C: Collaborator + 'static,
    {
        let prefix = collaborator.prefix();
        validate_prefix(prefix)?;
        self.check_free(prefix)?;

        self.mounts.push(Box::new(collaborator));
        Ok(self)
    }

    /// Keep `prefix` away from collaborators, e.g. the static file mount.
    pub fn reserve(&mut self, prefix: &str) -> Result<(), RoutingError> {
        validate_prefix(prefix)?;
        self.check_free(prefix)?;
        self.reserved.push(prefix.to_string());
        Ok(())
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.mounts.iter().map(|c| c.prefix()).collect()
    }

    /// Build the routes of every collaborator and nest them.
    ///
    /// A known path with an unsupported method answers like an unknown path.
    pub fn into_router(self, store: &StoreHandle) -> Router {
        self.mounts
            .into_iter()
            .fold(Router::new(), |router, collaborator| {
                tracing::info!(
                    collaborator = collaborator.name(),
                    prefix = collaborator.prefix(),
                    "Mounting routes"
                );
                let routes = collaborator
                    .routes(store.clone())
                    .method_not_allowed_fallback(not_found);
                router.nest(collaborator.prefix(), routes)
            })
    }

    fn check_free(&self, prefix: &str) -> Result<(), RoutingError> {
        let taken = self
            .reserved
            .iter()
            .map(String::as_str)
            .chain(self.mounts.iter().map(|c| c.prefix()))
            .find(|existing| overlaps(prefix, existing));

        match taken {
            Some(existing) => Err(RoutingError::Overlap {
                prefix: prefix.to_string(),
                existing: existing.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), RoutingError> {
    let valid = prefix.len() > 1
        && prefix.starts_with('/')
        && !prefix.ends_with('/')
        && !prefix.contains("//")
        && !prefix.contains(['{', '}', '*', ':']);

    if valid {
        Ok(())
    } else {
        Err(RoutingError::InvalidPrefix(prefix.to_string()))
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    nested(a, b) || nested(b, a)
}
