use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, header::HeaderMap, Client, StatusCode};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AccrualOracle, AccrualResponse, OracleOutcome};
use crate::error::AppResult;

/// HTTP client for `GET {base_url}/api/orders/{number}`
pub struct AccrualClient {
    client: Client,
    base_url: String,
    default_retry_after: Duration,
}

impl AccrualClient {
    /// `timeout` bounds every request end to end.
    pub fn new(base_url: &str, timeout: Duration, default_retry_after: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let base_url = base_url.trim_end_matches('/');
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url.to_string()
        } else {
            format!("http://{}", base_url)
        };

        Ok(Self {
            client,
            base_url,
            default_retry_after,
        })
    }

    fn order_url(&self, order_number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, order_number)
    }

    /// Integer seconds from `Retry-After`, else the configured default.
    fn retry_after(&self, headers: &HeaderMap) -> Duration {
        headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
    }
}

#[async_trait]
impl AccrualOracle for AccrualClient {
    async fn query(&self, order_number: &str) -> OracleOutcome {
        let response = match self.client.get(self.order_url(order_number)).send().await {
            Ok(response) => response,
            Err(e) => return OracleOutcome::TransientFailure(format!("request failed: {}", e)),
        };

        match response.status() {
            StatusCode::OK => {
                let body: AccrualResponse = match response.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        return OracleOutcome::TransientFailure(format!("undecodable body: {}", e))
                    }
                };

                if body.order != order_number {
                    warn!(
                        "Accrual oracle answered for order {} when asked about {}",
                        body.order, order_number
                    );
                    return OracleOutcome::TransientFailure("order number mismatch".to_string());
                }
                if body.accrual.is_some_and(|a| a < Decimal::ZERO) {
                    return OracleOutcome::TransientFailure("negative accrual".to_string());
                }

                debug!("Accrual oracle: order {} is {:?}", order_number, body.status);
                OracleOutcome::Accrual(body)
            }
            StatusCode::NO_CONTENT => OracleOutcome::NotRegistered,
            StatusCode::TOO_MANY_REQUESTS => OracleOutcome::RateLimited {
                retry_after: self.retry_after(response.headers()),
            },
            other => OracleOutcome::TransientFailure(format!("unexpected status {}", other)),
        }
    }
}
