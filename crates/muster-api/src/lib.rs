//! JSON REST API for Muster.
//!
//! Exposes axum [`Router`]s backed by any [`muster_core::store::MusterStore`].
//! Admin authentication is the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/admin/api", muster_api::admin_router(store.clone()))
//! .merge(muster_api::public_router(store.clone()))
//! ```

pub mod error;
pub mod periods;
pub mod public;
pub mod reports;
pub mod summary;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use muster_core::store::MusterStore;

pub use error::ApiError;

/// Admin endpoints, to be nested under a guarded prefix.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn admin_router<S>(store: Arc<S>) -> Router<()>
where
  S: MusterStore + 'static,
{
  Router::new()
    // Periods
    .route("/periods/current", get(periods::current::<S>))
    .route("/periods/reset", post(periods::reset::<S>))
    // Aggregates
    .route("/summary", get(summary::summary::<S>))
    .route("/absentees", get(summary::absentees::<S>))
    // Reports
    .route("/reports", get(reports::list::<S>))
    .route("/reports/{user_id}", get(reports::get_one::<S>))
    .route("/reports/{user_id}/history", get(reports::history::<S>))
    .with_state(store)
}

/// Unauthenticated member endpoints, mounted at the root.
pub fn public_router<S>(store: Arc<S>) -> Router<()>
where
  S: MusterStore + 'static,
{
  Router::new()
    .route("/public/me", get(public::me::<S>))
    .route("/public/roster", get(public::roster::<S>))
    .with_state(store)
}
