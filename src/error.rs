use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use mongodb::error::{ErrorKind, WriteFailure};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Code MongoDB reports for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(format!("{resource} not found"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(e) if is_duplicate_key(e) => "CONFLICT",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// True when retrying the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Database(e)
            if e.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR))
    }
}

pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref w)) => w.code == DUPLICATE_KEY,
        ErrorKind::Command(ref c) => c.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(e) if is_duplicate_key(e) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = match self {
            AppError::Validation(details) => json!({
                "error": self.to_string(),
                "code": self.code(),
                "details": details,
            }),
            AppError::Database(e) if is_duplicate_key(e) => json!({
                "error": "A record with the same unique value already exists",
                "code": self.code(),
            }),
            _ if status.is_server_error() => {
                error!("{self}");
                json!({ "error": "An internal error occurred", "code": self.code() })
            }
            _ => json!({ "error": self.to_string(), "code": self.code() }),
        };
        HttpResponse::build(status).json(body)
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        AppError::Internal(format!("bson serialization: {e}"))
    }
}

impl From<mongodb::bson::de::Error> for AppError {
    fn from(e: mongodb::bson::de::Error) -> Self {
        AppError::Internal(format!("bson deserialization: {e}"))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("password hashing: {e}"))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid token: {e}"))
    }
}

impl From<printpdf::Error> for AppError {
    fn from(e: printpdf::Error) -> Self {
        AppError::Internal(format!("pdf rendering: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    fn write_error(code: i32) -> AppError {
        let write: mongodb::error::WriteError = mongodb::bson::from_document(mongodb::bson::doc! {
            "code": code,
            "errmsg": "E11000 duplicate key error collection: countries",
        })
        .unwrap();
        AppError::Database(ErrorKind::Write(WriteFailure::WriteError(write)).into())
    }

    #[test]
    fn duplicate_key_becomes_conflict() {
        let err = write_error(DUPLICATE_KEY);
        assert!(matches!(&err, AppError::Database(e) if is_duplicate_key(e)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "CONFLICT");

        let other = write_error(121);
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            AppError::Validation(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("Client").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("in use".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message() {
        assert_eq!(AppError::not_found("Hotel").to_string(), "Hotel not found");
    }

    #[actix_web::test]
    async fn validation_body_lists_fields() {
        let err = AppError::Validation(vec![FieldError {
            field: "name".into(),
            message: "is required".into(),
        }]);
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["code"], "VALIDATION_ERROR");
        assert_eq!(value["details"][0]["field"], "name");
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let err = AppError::Internal("secret connection string".into());
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "An internal error occurred");
    }
}
