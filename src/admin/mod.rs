//! Administrative surface.
//!
//! # Responsibilities
//! - `POST /admin/reload` for operator-triggered reloads
//! - The `Reloader` shared by every reload trigger

pub mod handlers;
pub mod reload;

use axum::{routing::post, Router};

use crate::http::server::AppState;

pub use reload::{ReloadError, Reloader};

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/admin/reload", post(handlers::reload))
}
