//! Webhook signature verification.
//!
//! Implements verification of provider webhook signatures using HMAC-SHA256,
//! with timestamp validation to prevent replay attacks. Verification is pure
//! over its inputs; the sole configuration is the signing secret.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;
use super::provider_event::ProviderEvent;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of the signature header.
///
/// Format: `t=<timestamp>,v1=<signature>[,v1=...][,v0=...]`. Multiple `v1`
/// entries appear while a signing secret is being rolled; verification
/// succeeds if any candidate matches. `v0` and unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// All v1 (HMAC-SHA256) signature candidates, decoded from hex.
    pub v1_candidates: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a signature header string.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::SignatureInvalid` for any malformed header; a
    /// header we cannot parse can never authenticate the request.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_candidates: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(WebhookError::SignatureInvalid)?;

            match key {
                "t" => {
                    timestamp =
                        Some(value.parse().map_err(|_| WebhookError::SignatureInvalid)?);
                }
                "v1" => {
                    v1_candidates
                        .push(hex::decode(value).map_err(|_| WebhookError::SignatureInvalid)?);
                }
                _ => {
                    // v0 (legacy scheme) and unknown keys: ignored for
                    // forward compatibility
                }
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::SignatureInvalid)?;
        if v1_candidates.is_empty() {
            return Err(WebhookError::SignatureInvalid);
        }

        Ok(SignatureHeader {
            timestamp,
            v1_candidates,
        })
    }
}

/// Verifier for incoming webhook signatures.
pub struct EventVerifier {
    /// The webhook signing secret from the provider dashboard, when
    /// configured.
    secret: Option<SecretString>,
}

impl EventVerifier {
    /// Creates a verifier. `None` produces a verifier that rejects every
    /// request with `ConfigMissing`; the server still boots so the rest of
    /// the API stays available when webhooks are not set up.
    pub fn new(secret: Option<SecretString>) -> Self {
        Self { secret }
    }

    /// Verifies the webhook signature and parses the event.
    ///
    /// # Verification Steps
    ///
    /// 1. Parse the signature header
    /// 2. Validate the timestamp is within the freshness window
    /// 3. Compute the expected signature using HMAC-SHA256 over
    ///    `"{timestamp}.{payload}"`
    /// 4. Compare against each candidate in constant time
    /// 5. Parse the JSON payload into a typed event
    ///
    /// # Errors
    ///
    /// - `ConfigMissing` - no signing secret configured
    /// - `SignatureInvalid` - bad or missing signature, or timestamp outside
    ///   the freshness window
    /// - `PayloadMalformed` - body failed boundary validation
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ProviderEvent, WebhookError> {
        let secret = self.secret.as_ref().ok_or(WebhookError::ConfigMissing)?;

        let header = SignatureHeader::parse(signature_header)?;
        validate_timestamp(header.timestamp)?;

        let expected = compute_signature(secret.expose_secret(), header.timestamp, payload);
        let matched = header
            .v1_candidates
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::SignatureInvalid);
        }

        ProviderEvent::from_wire_json(payload)
    }
}

/// Validates that the timestamp is within acceptable bounds. Stale and
/// far-future timestamps fail as signature errors; a replayed signature is
/// still a signature problem as far as the caller is concerned.
fn validate_timestamp(timestamp: i64) -> Result<(), WebhookError> {
    let now = chrono::Utc::now().timestamp();
    let age = now - timestamp;

    if age > MAX_EVENT_AGE_SECS {
        return Err(WebhookError::SignatureInvalid);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(WebhookError::SignatureInvalid);
    }

    Ok(())
}

/// Computes the HMAC-SHA256 signature for the given timestamp and payload.
fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Performs constant-time comparison of two byte slices.
///
/// This prevents timing attacks that could leak information about the
/// expected signature.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a hex-encoded HMAC-SHA256 signature for use in test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
