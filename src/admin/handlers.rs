use axum::{extract::State, Json};

use crate::admin::reload::ReloadError;
use crate::http::server::AppState;
use crate::routing::ReloadSummary;

/// `POST /admin/reload`: reload the volume set from the configuration file.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadSummary>, ReloadError> {
    state.reloader.reload("admin").map(Json)
}
