//! HTTP API.
//!
//! `/api/records/...` is a plain record store in backend field names, the
//! protocol [`crate::store::RemoteStore`] speaks. Everything else serves
//! derived views in domain field names.

mod records;
mod views;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use salesdeck_core::{CrmError, FieldError, ValidationError};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::CrmService;
use crate::store::Stores;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    errors: Vec<FieldError>,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        let (status, errors) = match &err {
            CrmError::Validation(v) => (StatusCode::UNPROCESSABLE_ENTITY, v.errors.clone()),
            CrmError::NotFound { .. } => (StatusCode::NOT_FOUND, Vec::new()),
            CrmError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
        };
        Self {
            status,
            message: err.to_string(),
            errors,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        CrmError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        } else {
            tracing::debug!("{}: {}", self.status, self.message);
        }
        let body: ApiResponse<()> = ApiResponse::failure(self.message, self.errors);
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn create_router(stores: Stores) -> Router {
    router(CrmService::new(stores))
}

pub fn router(service: CrmService) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .merge(records::routes())
        .merge(views::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(service)
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("ok"))
}
