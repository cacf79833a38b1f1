use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use super::AuthService;
use crate::error::{AppError, AuthError};

/// Authenticated caller, taken from `Authorization: Bearer <token>`
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = bearer_token(header).ok_or(AuthError::MissingToken)?;
        let user_id = Arc::<AuthService>::from_ref(state).verify_token(token)?;

        Ok(AuthUser { user_id })
    }
}

/// Accepts `Bearer <token>` as well as a bare token.
fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let token = match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        Some(_) => return None,
        None => header.trim_end(),
    };
    (!token.is_empty()).then_some(token)
}
