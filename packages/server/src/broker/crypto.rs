//! Field-level encryption middleware.
//!
//! Operates only on top-level map entries whose value is a string; numbers,
//! booleans, lists, and nested structures pass through unmodified. This is
//! an explicit scope limitation of the middleware, not an oversight.
//!
//! The payload format is `base64( key_id(1) || nonce(12) || ciphertext+tag )`.
//! The key-id byte makes rotation failures explicit: a payload produced
//! under a retired key fails with `Decryption` instead of yielding garbage.

use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::BrokerError;

/// Nonce length for AES-GCM (96 bits).
const NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// StringCipher
// ---------------------------------------------------------------------------

/// Reversible symmetric transform over individual strings, supplied by the
/// hosting environment.
pub trait StringCipher: Send + Sync {
    /// Encrypts a plaintext string into an opaque payload.
    ///
    /// # Errors
    ///
    /// Fails only on cipher-internal errors.
    fn encrypt(&self, plaintext: &str) -> Result<String, BrokerError>;

    /// Decrypts a payload produced by [`StringCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// `Decryption` for corrupt payloads and for payloads produced under a
    /// different (rotated) key.
    fn decrypt(&self, payload: &str) -> Result<String, BrokerError>;
}

// ---------------------------------------------------------------------------
// AesGcmCipher
// ---------------------------------------------------------------------------

/// AES-256-GCM cipher with a one-byte key id for rotation diagnostics.
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
    key_id: u8,
}

impl AesGcmCipher {
    /// Derives a 256-bit key from a secret string via SHA-256.
    #[must_use]
    pub fn from_secret(secret: &str, key_id: u8) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
            key_id,
        }
    }
}

impl StringCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, BrokerError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| BrokerError::Decryption("encryption failed".into()))?;

        let mut payload = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        payload.push(self.key_id);
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    fn decrypt(&self, payload: &str) -> Result<String, BrokerError> {
        let bytes = BASE64
            .decode(payload)
            .map_err(|_| BrokerError::Decryption("payload is not valid base64".into()))?;
        if bytes.len() <= 1 + NONCE_LEN {
            return Err(BrokerError::Decryption("payload too short".into()));
        }
        if bytes[0] != self.key_id {
            return Err(BrokerError::Decryption(format!(
                "payload encrypted under key id {}, active key id is {}",
                bytes[0], self.key_id
            )));
        }

        let nonce = Nonce::from_slice(&bytes[1..=NONCE_LEN]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &bytes[1 + NONCE_LEN..])
            .map_err(|_| {
                BrokerError::Decryption("authentication failed (wrong or rotated key)".into())
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| BrokerError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

// ---------------------------------------------------------------------------
// Map-level transforms
// ---------------------------------------------------------------------------

/// Decrypts every top-level string entry of a parameter map in place.
///
/// # Errors
///
/// Propagates the first `Decryption` failure; partial progress is discarded
/// by the caller.
pub fn decrypt_params(
    cipher: &dyn StringCipher,
    params: &mut BTreeMap<String, Value>,
) -> Result<(), BrokerError> {
    for value in params.values_mut() {
        if let Value::String(s) = value {
            *s = cipher.decrypt(s)?;
        }
    }
    Ok(())
}

/// Encrypts every top-level string entry of a parameter map in place.
///
/// # Errors
///
/// Propagates cipher failures.
pub fn encrypt_params(
    cipher: &dyn StringCipher,
    params: &mut BTreeMap<String, Value>,
) -> Result<(), BrokerError> {
    for value in params.values_mut() {
        if let Value::String(s) = value {
            *s = cipher.encrypt(s)?;
        }
    }
    Ok(())
}

/// Encrypts the top-level string fields of a result value.
///
/// Only `Object` results are transformed; any other shape passes through
/// untouched.
///
/// # Errors
///
/// Propagates cipher failures.
pub fn encrypt_result(cipher: &dyn StringCipher, data: &mut Value) -> Result<(), BrokerError> {
    if let Value::Object(map) = data {
        for value in map.values_mut() {
            if let Value::String(s) = value {
                *s = cipher.encrypt(s)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::from_secret("unit-test-secret", 1)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let c = cipher();
        let payload = c.encrypt("hello world").unwrap();
        assert_ne!(payload, "hello world");
        assert_eq!(c.decrypt(&payload).unwrap(), "hello world");
    }

    #[test]
    fn nonces_make_ciphertexts_distinct() {
        let c = cipher();
        let a = c.encrypt("same input").unwrap();
        let b = c.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rotated_key_fails_loudly() {
        let old = AesGcmCipher::from_secret("old-secret", 1);
        let new = AesGcmCipher::from_secret("new-secret", 2);

        let payload = old.encrypt("secret value").unwrap();
        let err = new.decrypt(&payload).unwrap_err();
        assert!(matches!(err, BrokerError::Decryption(_)));
    }

    #[test]
    fn same_key_id_different_secret_fails_authentication() {
        let old = AesGcmCipher::from_secret("old-secret", 1);
        let imposter = AesGcmCipher::from_secret("new-secret", 1);

        let payload = old.encrypt("secret value").unwrap();
        let err = imposter.decrypt(&payload).unwrap_err();
        assert!(matches!(err, BrokerError::Decryption(_)));
    }

    #[test]
    fn garbage_payload_fails() {
        let c = cipher();
        assert!(c.decrypt("not base64 at all!!!").is_err());
        assert!(c.decrypt(&BASE64.encode([1u8, 2, 3])).is_err());
    }

    #[test]
    fn params_transform_touches_only_strings() {
        let c = cipher();
        let mut params = BTreeMap::new();
        params.insert("secret".to_string(), json!("top secret"));
        params.insert("count".to_string(), json!(42));
        params.insert("flag".to_string(), json!(true));
        params.insert("nested".to_string(), json!({"inner": "untouched"}));
        params.insert("list".to_string(), json!(["untouched"]));

        encrypt_params(&c, &mut params).unwrap();
        assert_ne!(params["secret"], json!("top secret"));
        assert_eq!(params["count"], json!(42));
        assert_eq!(params["flag"], json!(true));
        assert_eq!(params["nested"], json!({"inner": "untouched"}));
        assert_eq!(params["list"], json!(["untouched"]));

        decrypt_params(&c, &mut params).unwrap();
        assert_eq!(params["secret"], json!("top secret"));
    }

    #[test]
    fn result_transform_ignores_non_objects() {
        let c = cipher();

        let mut scalar = json!("bare string result");
        encrypt_result(&c, &mut scalar).unwrap();
        assert_eq!(scalar, json!("bare string result"));

        let mut object = json!({"token": "abc", "ttl": 60});
        encrypt_result(&c, &mut object).unwrap();
        assert_ne!(object["token"], json!("abc"));
        assert_eq!(object["ttl"], json!(60));
    }

    proptest! {
        #[test]
        fn round_trip_for_arbitrary_strings(value in ".*") {
            let c = cipher();
            let payload = c.encrypt(&value).unwrap();
            prop_assert_eq!(c.decrypt(&payload).unwrap(), value);
        }
    }
}
