//! Webhook signature verification.
//!
//! Providers sign `"{timestamp}." + body` with HMAC-SHA256 under a shared
//! per-provider secret and send the hex signature, the timestamp, and an
//! event id alongside the payload. Verification rejects missing secrets,
//! unparsable or stale timestamps, and mismatched signatures; nothing is
//! persisted for a rejected event.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{MailError, MailResult};

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature for a payload at a timestamp.
pub fn compute_webhook_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an inbound webhook signature and its replay window.
pub fn verify_webhook_signature(
    payload: &[u8],
    provided_signature: &str,
    timestamp: &str,
    secret: &str,
    replay_window_seconds: i64,
) -> MailResult<()> {
    verify_webhook_signature_at(
        Utc::now().timestamp(),
        payload,
        provided_signature,
        timestamp,
        secret,
        replay_window_seconds,
    )
}

fn verify_webhook_signature_at(
    now_epoch: i64,
    payload: &[u8],
    provided_signature: &str,
    timestamp: &str,
    secret: &str,
    replay_window_seconds: i64,
) -> MailResult<()> {
    if secret.is_empty() {
        return Err(MailError::SignatureVerification(
            "webhook secret is not configured".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| MailError::SignatureVerification("invalid timestamp".to_string()))?;

    if (now_epoch - ts).abs() > replay_window_seconds {
        return Err(MailError::SignatureVerification(
            "timestamp outside replay window".to_string(),
        ));
    }

    let expected = compute_webhook_signature(secret, timestamp, payload);
    let matches: bool = expected
        .as_bytes()
        .ct_eq(provided_signature.as_bytes())
        .into();
    if !matches {
        return Err(MailError::SignatureVerification(
            "invalid signature".to_string(),
        ));
    }

    Ok(())
}
