use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::dotenv::Error as DotError;
use crate::jsonwebtoken::errors::Error as JsonWebTokenError;
use crate::thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("jwt error: {0}")]
    JWTError(#[from] JsonWebTokenError),

    #[error("dotenv error: {0}")]
    DotEnvError(#[from] DotError),

    #[error("server error: {0}")]
    ServerError(String),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) | Error::JWTError(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DatabaseError(_) | Error::DotEnvError(_) | Error::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // raw errors stay in the server log, the client gets a sanitized message
        if status.is_server_error() {
            log::error!("{}", self);
            return HttpResponse::build(status).json(json!({ "error": "internal server error" }));
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Unauthorized("".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Forbidden("".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::Validation("".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::Conflict("".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::NotFound("".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::ServerError("".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_server_error_body_is_sanitized() {
        let resp = Error::ServerError("connection string leaked".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
