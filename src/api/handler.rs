use axum::{
    extract::{FromRef, State},
    http::{header::AUTHORIZATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::models::*;
use super::validation::ValidatedJson;
use crate::{
    auth::{AuthService, AuthUser},
    error::AppResult,
    ledger::{
        models::{Balance, OrderSubmission, User},
        BalanceLedger, OrderLedger,
    },
    reconciliation::Reconciler,
};

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderLedger,
    pub balances: BalanceLedger,
    pub auth: Arc<AuthService>,
    pub reconciler: Arc<Reconciler>,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

fn with_token(user: User, token: String) -> Response {
    (
        [(AUTHORIZATION, format!("Bearer {}", token))],
        Json(TokenResponse {
            user_id: user.id,
            login: user.login,
            token,
        }),
    )
        .into_response()
}

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CredentialsRequest>,
) -> AppResult<Response> {
    let (user, token) = state.auth.register(&request.login, &request.password).await?;
    Ok(with_token(user, token))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CredentialsRequest>,
) -> AppResult<Response> {
    let (user, token) = state.auth.login(&request.login, &request.password).await?;
    info!("🔑 User {} logged in", user.login);
    Ok(with_token(user, token))
}

/// POST /api/user/orders
///
/// The body is the bare order number. A fresh upload is answered with 202
/// and kicks off a reconciliation cycle in the background.
pub async fn upload_order(
    State(state): State<AppState>,
    user: AuthUser,
    body: String,
) -> AppResult<(StatusCode, Json<OrderResponse>)> {
    match state.orders.submit(user.user_id, &body).await? {
        OrderSubmission::Accepted(order) => {
            state.reconciler.trigger();
            Ok((StatusCode::ACCEPTED, Json(order.into())))
        }
        OrderSubmission::AlreadyUploaded(order) => Ok((StatusCode::OK, Json(order.into()))),
    }
}

/// GET /api/user/orders
pub async fn list_orders(State(state): State<AppState>, user: AuthUser) -> AppResult<Response> {
    let orders = state.orders.list_for_user(user.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let orders: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(Json(orders).into_response())
}

/// GET /api/user/balance
pub async fn get_balance(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<Balance>> {
    Ok(Json(state.balances.balance(user.user_id).await?))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<WithdrawRequest>,
) -> AppResult<Json<WithdrawalResponse>> {
    let withdrawal = state
        .balances
        .debit(user.user_id, request.order.trim(), request.sum)
        .await?;
    Ok(Json(withdrawal.into()))
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(State(state): State<AppState>, user: AuthUser) -> AppResult<Response> {
    let withdrawals = state.balances.withdrawals(user.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let withdrawals: Vec<WithdrawalResponse> = withdrawals.into_iter().map(Into::into).collect();
    Ok(Json(withdrawals).into_response())
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        oracle_backoff_secs: state.reconciler.backoff().remaining().map(|d| d.as_secs().max(1)),
    })
}
