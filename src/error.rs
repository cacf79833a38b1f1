use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Balance error: {0}")]
    Balance(#[from] BalanceError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External error: {0}")]
    ExternalError(String),
}

/// Order submission errors
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Order number is empty")]
    EmptyNumber,

    #[error("Order number {0} fails the Luhn check")]
    InvalidNumber(String),

    #[error("Order {0} was already uploaded by another user")]
    OwnedByAnotherUser(String),
}

/// Balance ledger errors
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Withdrawal sum must be positive, got {0}")]
    NonPositiveSum(String),

    #[error("Withdrawal reference {0} fails the Luhn check")]
    InvalidReference(String),
}

/// Credential and token errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Login {0} is already taken")]
    LoginTaken(String),

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Order(OrderError::EmptyNumber) => (
                StatusCode::BAD_REQUEST,
                "EMPTY_ORDER_NUMBER",
                "Order number is required".to_string(),
                None,
            ),
            AppError::Order(OrderError::InvalidNumber(number)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_ORDER_NUMBER",
                format!("Order number {} is not valid", number),
                None,
            ),
            AppError::Order(OrderError::OwnedByAnotherUser(number)) => (
                StatusCode::CONFLICT,
                "ORDER_OWNED_BY_ANOTHER_USER",
                format!("Order {} was already uploaded by another user", number),
                None,
            ),
            AppError::Balance(BalanceError::InsufficientFunds { required, available }) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_FUNDS",
                "Insufficient funds".to_string(),
                Some(serde_json::json!({
                    "required": required,
                    "available": available,
                })),
            ),
            AppError::Balance(BalanceError::NonPositiveSum(sum)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_SUM",
                format!("Withdrawal sum must be positive, got {}", sum),
                None,
            ),
            AppError::Balance(BalanceError::InvalidReference(number)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_ORDER_NUMBER",
                format!("Order number {} is not valid", number),
                None,
            ),
            AppError::Auth(AuthError::LoginTaken(login)) => (
                StatusCode::CONFLICT,
                "LOGIN_TAKEN",
                format!("Login {} is already taken", login),
                None,
            ),
            AppError::Auth(AuthError::InvalidCredentials) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid login or password".to_string(),
                None,
            ),
            AppError::Auth(AuthError::MissingToken) | AppError::Auth(AuthError::InvalidToken) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Unauthorized".to_string(),
                None,
            ),
            AppError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                message,
                None,
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<MigrateError> for AppError {
    fn from(error: MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing error: {:?}", error))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(format!("Token error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (AppError::Order(OrderError::EmptyNumber), StatusCode::BAD_REQUEST),
            (
                AppError::Order(OrderError::InvalidNumber("1".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Order(OrderError::OwnedByAnotherUser("1".into())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Balance(BalanceError::InsufficientFunds {
                    required: "600".into(),
                    available: "500".into(),
                }),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (AppError::Auth(AuthError::InvalidToken), StatusCode::UNAUTHORIZED),
            (AppError::Auth(AuthError::LoginTaken("a".into())), StatusCode::CONFLICT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
