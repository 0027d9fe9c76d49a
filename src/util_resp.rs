use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::{Value, json};

pub type ApiResult<T> = Result<T, ApiError>;

/// Response type of most read handlers: a JSON body or a taxonomy error.
pub type JsonResult = ApiResult<Json<Value>>;

/// Response type of creation handlers (201 + JSON body).
pub type CreatedResult = ApiResult<(StatusCode, Json<Value>)>;

pub fn ok(body: Value) -> JsonResult {
    Ok(Json(body))
}

pub fn created(body: Value) -> CreatedResult {
    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed or missing input, or a semantically wrong combination.
    BadRequest(String),
    /// Well-typed value failing a domain constraint.
    UnprocessableEntity(String),
    /// The entity does not exist, or is not visible to this caller.
    NotFound,
    /// A state-machine precondition or uniqueness constraint failed.
    Conflict(String),
    Unauthorized,
    Forbidden,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnprocessableEntity(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg)
            }
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Insufficient privileges".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            ),
        };
        (status, Json(json!({ "error": { "message": message } })))
            .into_response()
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            ) => ApiError::Conflict(info.message().to_string()),
            other => {
                tracing::error!(error = %other, "database error");
                ApiError::Internal
            }
        }
    }
}

/// Bodies that fail to deserialize surface in the same error envelope
/// as domain validation failures.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// Replaces the store's unique-violation wording with a domain message,
    /// leaving every other kind untouched.
    pub fn on_conflict(self, message: &str) -> Self {
        match self {
            ApiError::Conflict(_) => ApiError::Conflict(message.to_string()),
            other => other,
        }
    }
}
