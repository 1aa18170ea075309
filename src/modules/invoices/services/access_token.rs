use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Mint an unguessable public access token (64 hex chars)
pub fn mint_access_token(invoice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(invoice_id.as_bytes());
    hex::encode(hasher.finalize())
}
