use crate::core::{AppError, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `Stripe-Signature` headers of the form `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// The signed payload is `"{t}.{raw body}"`, keyed with the endpoint secret.
/// Without a configured secret every delivery is rejected.
#[derive(Debug, Clone)]
pub struct StripeSignatureVerifier {
    secret: Option<String>,
    tolerance: Duration,
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl StripeSignatureVerifier {
    pub fn new(secret: Option<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify against an explicit clock, in unix seconds
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| AppError::signature("Webhook secret is not configured"))?;

        let header = parse_header(header)?;

        let age = now.abs_diff(header.timestamp);
        if age > self.tolerance.as_secs() {
            return Err(AppError::signature(format!(
                "Timestamp outside tolerance ({}s old)",
                age
            )));
        }

        for candidate in &header.signatures {
            let mac = signed_payload_mac(secret, header.timestamp, payload)?;
            // verify_slice compares in constant time
            if mac.verify_slice(candidate).is_ok() {
                return Ok(());
            }
        }

        Err(AppError::signature("No matching v1 signature"))
    }

    /// Header value for `payload`, as the processor would send it
    pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
        let mac = signed_payload_mac(secret, timestamp, payload)?;
        Ok(format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ))
    }
}

fn signed_payload_mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::signature("Invalid webhook secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

fn parse_header(header: &str) -> Result<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                if timestamp.is_some() {
                    return Err(AppError::signature("Duplicate timestamp"));
                }
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| AppError::signature("Invalid timestamp"))?;
                timestamp = Some(parsed);
            }
            // Undecodable entries are ignored, like unknown schemes
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| AppError::signature("Missing timestamp"))?;
    if signatures.is_empty() {
        return Err(AppError::signature("Missing v1 signature"));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}
