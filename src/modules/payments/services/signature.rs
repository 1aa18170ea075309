use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of a notifier payload
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify the `X-Signature` header of a notifier delivery in constant time
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<()> {
    let expected = hex::decode(signature_hex.trim())
        .map_err(|_| AppError::unauthorized("Malformed webhook signature"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Configuration(format!("Invalid webhook secret: {}", e)))?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| AppError::unauthorized("Invalid webhook signature"))
}
