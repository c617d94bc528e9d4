//! Accrual service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use super::{AccrualConfig, AccrualError, AccrualQuote, QueryOutcome};

/// Client for the external accrual service.
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// Ask the service about one order.
    async fn query(&self, order_number: &str) -> Result<QueryOutcome, AccrualError>;
}

/// HTTP implementation of [`AccrualClient`].
///
/// Holds no state besides the connection pool: rate limiting is reported as
/// [`AccrualError::RateLimited`] and handled by the caller.
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
}

impl HttpAccrualClient {
    /// Create a client using the configured base URL and request timeout.
    pub fn new(config: &AccrualConfig) -> Result<Self, AccrualError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AccrualError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, order_number: &str) -> String {
        format!(
            "{}/api/orders/{}",
            self.base_url,
            urlencoding::encode(order_number)
        )
    }
}

fn map_request_error(e: reqwest::Error) -> AccrualError {
    if e.is_timeout() {
        AccrualError::Timeout
    } else if e.is_connect() {
        AccrualError::Connection(e.to_string())
    } else if e.is_decode() {
        AccrualError::Decode(e.to_string())
    } else {
        AccrualError::Client(e.to_string())
    }
}

/// `Retry-After` in its delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn decode_quote(order_number: &str, body: &str) -> Result<AccrualQuote, AccrualError> {
    let quote: AccrualQuote = serde_json::from_str(body)
        .map_err(|e| AccrualError::Decode(format!("invalid quote body: {}", e)))?;

    if quote.order != order_number {
        return Err(AccrualError::Decode(format!(
            "quote is for order {}, expected {}",
            quote.order, order_number
        )));
    }

    if let Some(accrual) = quote.accrual {
        if !accrual.is_finite() || accrual < 0.0 {
            return Err(AccrualError::Decode(format!(
                "invalid accrual amount {} for order {}",
                accrual, order_number
            )));
        }
    }

    Ok(quote)
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn query(&self, order_number: &str) -> Result<QueryOutcome, AccrualError> {
        let url = self.order_url(order_number);
        debug!("Accrual query: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.text().await.map_err(map_request_error)?;
                decode_quote(order_number, &body).map(QueryOutcome::Quote)
            }
            StatusCode::NO_CONTENT => Ok(QueryOutcome::NotYetKnown),
            StatusCode::TOO_MANY_REQUESTS => Err(AccrualError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            }),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(AccrualError::UnexpectedStatus {
                    status: status.as_u16(),
                    message: body.chars().take(200).collect(),
                })
            }
        }
    }
}
