use axum::extract::State;
use axum::Json;
use je_protocol::HealthResponse;

use crate::server::app::AppState;

/// GET /live (§6).
pub async fn live(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if sqlx::query("SELECT 1").execute(&state.db).await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
    })
}
