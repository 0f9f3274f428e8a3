use std::time::Duration;

use acr_schemas::{OracleReport, OracleStatus, OrderNumber};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

use crate::decode::decode_report;
use crate::{AccrualOracle, OracleError};

/// Longest error-body excerpt kept in `OracleError::Status`.
const BODY_EXCERPT_MAX: usize = 256;

/// HTTP client for `GET {base}/api/orders/{number}`.
///
/// Holds one pooled `reqwest::Client`; clone the oracle (or wrap it in an
/// `Arc`) instead of building a second one.
#[derive(Debug, Clone)]
pub struct HttpAccrualOracle {
    http: reqwest::Client,
    base_address: String,
}

impl HttpAccrualOracle {
    /// `timeout` bounds each whole request (connect + headers + body).
    pub fn new(base_address: &str, timeout: Duration) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_address: base_address.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    fn order_url(&self, order: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_address, order)
    }
}

#[async_trait::async_trait]
impl AccrualOracle for HttpAccrualOracle {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_status(&self, order: &OrderNumber) -> Result<OracleReport, OracleError> {
        let resp = self
            .http
            .get(self.order_url(order))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(order = %order, status = status.as_u16(), "accrual service answered");

        if status == StatusCode::NO_CONTENT {
            return Ok(OracleReport::new(
                order.clone(),
                OracleStatus::NotRegistered,
                None,
            ));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(OracleError::RateLimited { retry_after });
        }

        // Body is read to the end on every remaining path so the connection
        // goes back to the pool.
        let body = resp
            .bytes()
            .await
            .map_err(|e| OracleError::Transport(format!("body read failed: {e}")))?;

        if !status.is_success() {
            return Err(OracleError::Status {
                code: status.as_u16(),
                body: excerpt(&body),
            });
        }

        decode_report(order, &body)
    }
}

/// Delta-seconds form only; HTTP-date values fall back to the configured backoff.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(BODY_EXCERPT_MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_accepts_seconds_only() {
        assert_eq!(parse_retry_after(" 60 "), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn base_address_trailing_slash_is_trimmed() {
        let o = HttpAccrualOracle::new("http://accrual:8080//", Duration::from_secs(1)).unwrap();
        let n = OrderNumber::parse("42").unwrap();
        assert_eq!(o.order_url(&n), "http://accrual:8080/api/orders/42");
    }

    #[test]
    fn long_bodies_are_cut() {
        let body = "x".repeat(1000);
        let e = excerpt(body.as_bytes());
        assert_eq!(e.chars().count(), BODY_EXCERPT_MAX + 1);
    }
}
