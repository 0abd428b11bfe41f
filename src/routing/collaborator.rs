//! Externally supplied handler sets.

use axum::Router;

use crate::store::StoreHandle;

pub const AUTH_PREFIX: &str = "/api/auth";
pub const SCENARIOS_PREFIX: &str = "/api/scenarios";
pub const SESSIONS_PREFIX: &str = "/api/sessions";

/// A handler set mounted under a path prefix.
///
/// Handlers that need the store take it from the handle passed to `routes`
/// and should return `AppError` so failures reach the fault boundary.
pub trait Collaborator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Mount point, e.g. `/api/auth`.
    fn prefix(&self) -> &str;

    /// Build the routes, relative to the prefix.
    fn routes(&self, store: StoreHandle) -> Router;
}
