use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::{Result, TransferError};

/// Key lengths accepted by secure transfers.
pub const KEY_SIZES: [usize; 2] = [16, 32];

/// Generate a random AES-GCM key of `len` bytes (16 or 32).
/// Keys are never generated inside a transfer; this is for callers.
pub fn generate_key(len: usize) -> Result<Vec<u8>> {
    check_len(len)?;
    let mut key = vec![0u8; len];
    OsRng.fill_bytes(&mut key);
    Ok(key)
}

/// Encode a key to base64 for display/sharing.
pub fn key_to_base64(key: &[u8]) -> String {
    BASE64.encode(key)
}

/// Decode a base64 key and check its length.
pub fn key_from_base64(encoded: &str) -> Result<Vec<u8>> {
    let key = BASE64
        .decode(encoded.trim())
        .map_err(|e| TransferError::InvalidArgument(format!("key is not base64: {}", e)))?;
    check_len(key.len())?;
    Ok(key)
}

fn check_len(len: usize) -> Result<()> {
    if KEY_SIZES.contains(&len) {
        Ok(())
    } else {
        Err(TransferError::InvalidArgument(format!(
            "key must be 16 or 32 bytes, got {}",
            len
        )))
    }
}
