//! Payload encryption for telemetry envelopes
//!
//! Application-level encrypt/decrypt for everything the edge sends,
//! independent of transport encryption. The wire format is a single
//! base64 string of `nonce (12 bytes) || ciphertext || GCM tag (16 bytes)`
//! sealed with a pre-shared AES-256 key.
//!
//! Decryption is all-or-nothing: a tampered envelope fails tag
//! verification and yields no partial plaintext.

use crate::error::{FarwatchError, Result};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// AES-256-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Smallest decodable envelope: a nonce plus a tag around an empty body
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN + TAG_LEN;

/// A pre-shared 256-bit key
///
/// Both sides of the link hold the same key, distributed out of band.
/// The debug representation is redacted.
#[derive(Clone)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Wrap raw key bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its 64-character hex representation
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != 64 {
            return Err(FarwatchError::Config(format!(
                "Shared key must be 64 hex characters (32 bytes), got {}",
                hex.len()
            )));
        }
        // from_str_radix tolerates a sign per pair; require bare digits.
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FarwatchError::Config(
                "Shared key must contain only hex characters".to_string(),
            ));
        }

        let mut bytes = [0u8; 32];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let pair = &hex[i * 2..i * 2 + 2];
            *chunk = u8::from_str_radix(pair, 16).map_err(|_| {
                FarwatchError::Config(format!("Invalid hex in shared key at position {}", i * 2))
            })?;
        }
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedKey(redacted)")
    }
}

/// AES-256-GCM sealer/opener for telemetry payloads
///
/// Each seal draws a fresh random nonce, so the same plaintext never
/// produces the same envelope twice.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    /// Create a cipher from a shared key
    pub fn new(key: &SharedKey) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).expect("32-byte key");
        Self { cipher }
    }

    /// Serialize and seal a payload into a base64 envelope
    pub fn seal<T: Serialize>(&self, payload: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(payload)?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| FarwatchError::Config(format!("Encryption failed: {}", e)))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(nonce.as_slice());
        raw.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(raw))
    }

    /// Open a base64 envelope and deserialize the plaintext
    ///
    /// Fails with `Format` for undecodable or truncated input and with
    /// `Auth` when tag verification rejects the ciphertext (tampering or
    /// a mismatched key).
    pub fn open<T: DeserializeOwned>(&self, envelope: &str) -> Result<T> {
        let raw = BASE64
            .decode(envelope)
            .map_err(|e| FarwatchError::Format(format!("Invalid base64 envelope: {}", e)))?;

        if raw.len() < MIN_ENVELOPE_LEN {
            return Err(FarwatchError::Format(format!(
                "Envelope too short: {} bytes, minimum is {}",
                raw.len(),
                MIN_ENVELOPE_LEN
            )));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| FarwatchError::Auth("Envelope failed verification".to_string()))?;

        serde_json::from_slice(&plaintext).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SharedKey {
        SharedKey::new([0x42; 32])
    }

    fn test_key_2() -> SharedKey {
        SharedKey::new([0x7A; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = PayloadCipher::new(&test_key());
        let payload = serde_json::json!({"cpu": 41.5, "node": "edge-01"});

        let envelope = cipher.seal(&payload).unwrap();
        let opened: serde_json::Value = cipher.open(&envelope).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn test_each_seal_unique_envelope() {
        let cipher = PayloadCipher::new(&test_key());
        let payload = serde_json::json!({"data": "same"});

        let e1 = cipher.seal(&payload).unwrap();
        let e2 = cipher.seal(&payload).unwrap();

        // Same plaintext must produce different envelopes (random nonce)
        assert_ne!(e1, e2);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let sealer = PayloadCipher::new(&test_key());
        let opener = PayloadCipher::new(&test_key_2());

        let envelope = sealer.seal(&serde_json::json!({"data": 1})).unwrap();
        let result: Result<serde_json::Value> = opener.open(&envelope);
        assert!(matches!(result, Err(FarwatchError::Auth(_))));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = PayloadCipher::new(&test_key());
        let envelope = cipher.seal(&serde_json::json!({"data": 1})).unwrap();

        let mut raw = BASE64.decode(&envelope).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0x01;
        let tampered = BASE64.encode(raw);

        let result: Result<serde_json::Value> = cipher.open(&tampered);
        assert!(matches!(result, Err(FarwatchError::Auth(_))));
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let cipher = PayloadCipher::new(&test_key());
        let envelope = cipher.seal(&serde_json::json!({"data": 1})).unwrap();

        let mut raw = BASE64.decode(&envelope).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x80;
        let tampered = BASE64.encode(raw);

        let result: Result<serde_json::Value> = cipher.open(&tampered);
        assert!(matches!(result, Err(FarwatchError::Auth(_))));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let cipher = PayloadCipher::new(&test_key());

        // 27 decoded bytes, one short of nonce + tag
        let short = BASE64.encode([0u8; MIN_ENVELOPE_LEN - 1]);
        let result: Result<serde_json::Value> = cipher.open(&short);
        assert!(matches!(result, Err(FarwatchError::Format(_))));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let cipher = PayloadCipher::new(&test_key());
        let result: Result<serde_json::Value> = cipher.open("not!!valid@@base64");
        assert!(matches!(result, Err(FarwatchError::Format(_))));
    }

    #[test]
    fn test_key_from_hex() {
        let hex = "42".repeat(32);
        let key = SharedKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), &[0x42; 32]);

        // Surrounding whitespace tolerated (env var hygiene)
        let key = SharedKey::from_hex(&format!("  {}\n", hex)).unwrap();
        assert_eq!(key.as_bytes(), &[0x42; 32]);
    }

    #[test]
    fn test_key_from_hex_wrong_length() {
        let result = SharedKey::from_hex("abcd");
        assert!(matches!(result, Err(FarwatchError::Config(_))));
    }

    #[test]
    fn test_key_from_hex_invalid_chars() {
        let bad = "zz".repeat(32);
        let result = SharedKey::from_hex(&bad);
        assert!(matches!(result, Err(FarwatchError::Config(_))));

        // Signs parse per-pair under from_str_radix; they are not hex.
        let signed = "+b".repeat(32);
        let result = SharedKey::from_hex(&signed);
        assert!(matches!(result, Err(FarwatchError::Config(_))));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = test_key();
        assert_eq!(format!("{:?}", key), "SharedKey(redacted)");
    }

    #[test]
    fn test_seal_typed_message() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Reading {
            cpu: f64,
            node: String,
        }

        let cipher = PayloadCipher::new(&test_key());
        let reading = Reading {
            cpu: 12.5,
            node: "edge-09".to_string(),
        };

        let envelope = cipher.seal(&reading).unwrap();
        let opened: Reading = cipher.open(&envelope).unwrap();
        assert_eq!(opened, reading);
    }

    #[test]
    fn test_cross_cipher_interop() {
        // Two ciphers built from the same hex key must interoperate
        let hex = "a1".repeat(32);
        let edge = PayloadCipher::new(&SharedKey::from_hex(&hex).unwrap());
        let central = PayloadCipher::new(&SharedKey::from_hex(&hex).unwrap());

        let envelope = edge.seal(&serde_json::json!({"latency_ms": 18})).unwrap();
        let opened: serde_json::Value = central.open(&envelope).unwrap();
        assert_eq!(opened["latency_ms"], 18);
    }
}
