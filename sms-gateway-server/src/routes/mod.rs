pub mod accounts;
pub mod sms;

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, ResponseError};
use sea_orm::DatabaseConnection;
use sms_gateway_logic::{auth::AuthCache, error::ServiceError};
use sms_gateway_entity::accounts::Model as Account;

pub struct AppState {
    pub db: DatabaseConnection,
    pub auth: AuthCache,
}

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolves the `X-API-Key` header to an account, or fails the request with
/// a 401. Handlers call this explicitly on every tenant-scoped route.
pub async fn authenticate(
    state: &AppState,
    request: &HttpRequest,
) -> Result<Account, ApiError> {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError(ServiceError::Unauthorized))?;
    Ok(state.auth.authenticate(&state.db, api_key).await?)
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] ServiceError);

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            ServiceError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            ServiceError::AccountExists => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::KeyGenerationExhausted
            | ServiceError::Database(_)
            | ServiceError::Cache(_)
            | ServiceError::Serialization(_)
            | ServiceError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match &self.0 {
            ServiceError::Validation { field, message } => {
                serde_json::json!({ "message": message, "field": field })
            }
            // infrastructure details stay in the logs
            _ if status.is_server_error() => {
                tracing::error!(error = %self.0, "request failed");
                serde_json::json!({ "message": "internal server error" })
            }
            other => serde_json::json!({ "message": other.to_string() }),
        };
        HttpResponse::build(status).json(body)
    }
}

pub async fn health() -> web::Json<serde_json::Value> {
    web::Json(serde_json::json!({
        "status": "healthy",
        "service": "sms_gateway",
    }))
}
