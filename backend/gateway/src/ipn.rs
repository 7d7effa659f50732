//! PayPal Instant Payment Notification intake.
//!
//! ## Authentication
//!
//! Every notification is posted back to PayPal verbatim, prefixed with
//! `cmd=_notify-validate`, and only processed when PayPal answers `VERIFIED`.
//!
//! ## Resilience
//!
//! * Network errors, `429` and `5xx` answers are retried with exponential
//!   back-off, at most [`MAX_ATTEMPTS`] times.
//! * When retries run out the caller answers `502` so PayPal re-delivers.

use std::time::Duration;

use async_trait::async_trait;
use donation_flow::RawPaymentEvent;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::errors::{GatewayError, Result};

pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

const VALIDATE_PREFIX: &[u8] = b"cmd=_notify-validate&";

/// Decode a form-urlencoded IPN body. Unknown fields are ignored.
pub fn parse_ipn(body: &[u8]) -> RawPaymentEvent {
    let mut raw = RawPaymentEvent::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        let slot = match key.as_ref() {
            "txn_type" => &mut raw.txn_type,
            "payment_status" => &mut raw.payment_status,
            "custom" => &mut raw.custom,
            "txn_id" => &mut raw.txn_id,
            "parent_txn_id" => &mut raw.parent_txn_id,
            "pending_reason" => &mut raw.pending_reason,
            "reason_code" => &mut raw.reason_code,
            "mc_gross" => &mut raw.mc_gross,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    raw
}

/// Confirms a notification really came from the payment processor.
#[async_trait]
pub trait IpnVerifier: Send + Sync {
    async fn verify(&self, body: &[u8]) -> Result<()>;
}

pub struct PayPalVerifier {
    client: Client,
    url: String,
    initial_backoff: Duration,
}

impl PayPalVerifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    #[cfg(test)]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }
}

#[async_trait]
impl IpnVerifier for PayPalVerifier {
    async fn verify(&self, body: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(VALIDATE_PREFIX.len() + body.len());
        payload.extend_from_slice(VALIDATE_PREFIX);
        payload.extend_from_slice(body);

        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let response = self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(USER_AGENT, concat!("donation-gateway/", env!("CARGO_PKG_VERSION")))
                .body(payload.clone())
                .send()
                .await;

            match response {
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!("IPN verification request failed (will retry in {backoff:?}): {e}");
                }
                Err(e) => return Err(GatewayError::Http(e)),
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        if attempt >= MAX_ATTEMPTS {
                            return Err(GatewayError::VerifierUnavailable(status.as_u16()));
                        }
                        warn!("IPN verifier answered {status} (will retry in {backoff:?})");
                    } else if !status.is_success() {
                        return Err(GatewayError::VerifierUnavailable(status.as_u16()));
                    } else {
                        let verdict = resp.text().await?;
                        return match verdict.trim() {
                            "VERIFIED" => {
                                debug!("IPN verified after {attempt} attempt(s)");
                                Ok(())
                            }
                            other => Err(GatewayError::Unverified(other.to_string())),
                        };
                    }
                }
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
            attempt += 1;
        }
    }
}
