//! Merged calendar events and cache control

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use calmerge_core::Window;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/calendars", get(get_calendars))
        .route("/api/calendars/refresh", post(refresh))
}

/// Optional window bounds, RFC 3339 or `YYYY-MM-DD`
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// GET /api/calendars - Events from every configured calendar
async fn get_calendars(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Response, AppError> {
    let engine = state.engine();

    let window = if query.start.is_none() && query.end.is_none() {
        None
    } else {
        Some(Window::from_args(
            query.start.as_deref(),
            query.end.as_deref(),
            Utc::now(),
            &engine.local_timezone(),
            engine.window_days(),
        )?)
    };

    let result = engine.get_aggregated_events(window).await?;
    Ok(Json(result.as_ref()).into_response())
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub message: String,
}

/// POST /api/calendars/refresh - Drop the cached result
async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    state.engine().invalidate_cache();
    Json(RefreshResponse {
        message: "Cache cleared, next request will fetch fresh data".to_string(),
    })
}
