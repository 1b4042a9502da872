//! HTTP API over a [`ConfigService`].
//!
//! Serves the routes that [`RemoteRepository`](crate::store::RemoteRepository)
//! talks to:
//!
//! | Route                     | Handler                      |
//! |---------------------------|------------------------------|
//! | `GET /health`             | liveness probe               |
//! | `GET /config`             | list (prefix, paging, flags) |
//! | `GET /config/{key}`       | get                          |
//! | `PUT /config/{key}`       | set                          |
//! | `DELETE /config/{key}`    | unset                        |
//! | `POST /config:import`     | import                       |
//! | `GET /config:export`      | export                       |

mod handlers;
pub mod types;

use anyhow::Context;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::store::{ConfigService, StoreError, ValidationError, ValidationIssue};
use types::ErrorBody;

/// Request timeout used by [`serve`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Errors
// ============================================================================

/// Error returned by every handler; renders as `{error, message, issues?}`.
#[derive(Debug)]
pub enum AppError {
    BadRequest {
        message: String,
        issues: Vec<ValidationIssue>,
    },
    NotFound(String),
    Internal(String),
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BadRequest",
            Self::NotFound(_) => "NotFound",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest {
            message: err.to_string(),
            issues: err.into_issues(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(err) => err.into(),
            other => Self::Internal(format!("{other}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.error_code();
        let (message, issues) = match self {
            Self::BadRequest { message, issues } => (message, issues),
            Self::NotFound(message) => (message, Vec::new()),
            Self::Internal(message) => {
                error!(error = %message, "Request failed");
                (message, Vec::new())
            },
        };
        let body = ErrorBody {
            error,
            message,
            issues,
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Builds the router with request tracing.
pub fn router(service: ConfigService) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::config_list))
        .route(
            "/config/{key}",
            get(handlers::config_get)
                .put(handlers::config_set)
                .delete(handlers::config_unset),
        )
        .route("/config:import", post(handlers::config_import))
        .route("/config:export", get(handlers::config_export))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves `service` on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(service: ConfigService, addr: SocketAddr) -> anyhow::Result<()> {
    serve_with_timeout(service, addr, DEFAULT_REQUEST_TIMEOUT).await
}

/// Like [`serve`], with an explicit per-request timeout.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve_with_timeout(
    service: ConfigService,
    addr: SocketAddr,
    request_timeout: Duration,
) -> anyhow::Result<()> {
    let app = router(service).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;
    info!(addr = %local, timeout = ?request_timeout, "Config API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Config API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        // Without a signal handler, keep serving until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProtocolError;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(AppError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_map_to_status() {
        let validation = StoreError::from(ValidationError::single("key", "bad"));
        let AppError::BadRequest { issues, .. } = AppError::from(validation) else {
            panic!("expected bad request");
        };
        assert_eq!(issues[0].field, "key");

        let protocol = StoreError::from(ProtocolError::Status {
            status: 502,
            body: "upstream".to_string(),
        });
        assert!(matches!(AppError::from(protocol), AppError::Internal(_)));

        let persistence = StoreError::from(anyhow::anyhow!("disk full"));
        assert_eq!(
            AppError::from(persistence).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "NotFound",
            message: "Config key \"a\" was not found".to_string(),
            issues: Vec::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "NotFound", "message": "Config key \"a\" was not found"})
        );
    }
}
