pub mod calendars;
pub mod health;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use calmerge_core::EngineError;
use serde::Serialize;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert anyhow errors to HTTP responses.
///
/// Window and configuration errors are the caller's fault (400); anything
/// else from the engine is a 500.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0.downcast_ref::<EngineError>() {
            Some(EngineError::InvalidWindow { .. }) | Some(EngineError::Config(_)) => {
                (StatusCode::BAD_REQUEST, "Invalid date range")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch calendars"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Calendar endpoint error");
        }

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::response::Response;
    use calmerge_core::{CalendarEngine, EngineConfig};

    use crate::state::AppState;

    /// State around an engine with no calendars configured.
    pub fn empty_state() -> AppState {
        let config = EngineConfig {
            timezone: Some("America/Chicago".to_string()),
            ..EngineConfig::default()
        };
        AppState::new(Arc::new(CalendarEngine::from_config(&config).unwrap()))
    }

    pub async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
