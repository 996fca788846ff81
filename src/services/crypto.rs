// SPDX-License-Identifier: MIT

//! Token encryption at rest.
//!
//! Provider tokens are stored as AES-256-GCM ciphertext with a random
//! 96-bit nonce prepended, base64-encoded for transport. The cipher sits
//! behind an `encode`/`decode` pair so storage code never sees plaintext
//! key material handling.

use crate::error::AppError;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;

/// Length of the AES-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for provider tokens.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl TokenCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt a token string. Returns base64(nonce || ciphertext).
    pub fn encode(&self, plaintext: &str) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = GenericArray::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encryption failed: {}", e)))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to the token string.
    pub fn decode(&self, encoded: &str) -> Result<String, AppError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token base64 decode failed: {}", e)))?;

        if combined.len() <= NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Token ciphertext too short"
            )));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&self.key));

        let plaintext = cipher
            .decrypt(GenericArray::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token is not valid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> TokenCipher {
        TokenCipher::new([42u8; 32])
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cipher = test_cipher();
        let token = "a1b2c3d4e5f6_very_secret_access_token";

        let encoded = cipher.encode(token).unwrap();
        assert_ne!(encoded, token);

        let decoded = cipher.decode(&encoded).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_encode_is_randomized() {
        let cipher = test_cipher();
        let a = cipher.encode("same input").unwrap();
        let b = cipher.encode("same input").unwrap();
        // Random nonce means identical plaintext never repeats ciphertext
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_rejects_tampering() {
        let cipher = test_cipher();
        let encoded = cipher.encode("token").unwrap();

        let mut bytes = BASE64.decode(&encoded).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(bytes);

        assert!(cipher.decode(&tampered).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_key() {
        let encoded = test_cipher().encode("token").unwrap();
        let other = TokenCipher::new([9u8; 32]);
        assert!(other.decode(&encoded).is_err());
    }
}
