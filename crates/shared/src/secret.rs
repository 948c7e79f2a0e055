//! Authenticated encryption for certificate unlock secrets.
//!
//! Unlock passwords are stored only in encrypted form and decrypted just
//! before a signing operation. AES-256-GCM with a 96-bit nonce and a 128-bit
//! tag; the process-wide key comes from the `CERT_ENCRYPTION_KEY` setting.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Nonce length in bytes (96 bits, the GCM standard size).
const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
const TAG_LEN: usize = 16;

/// Errors raised when a stored secret cannot be recovered.
///
/// Decryption fails closed: a malformed token or a tampered ciphertext is an
/// error, never garbage plaintext.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("Malformed secret token: {0}")]
    MalformedToken(String),

    #[error("Secret authentication failed")]
    AuthenticationFailed,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidPlaintext,
}

/// Errors raised while encrypting a secret.
#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("Encryption failed")]
    CipherFailure,
}

/// Symmetric codec for the certificate unlock secret.
///
/// Token format: `nonceB64:tagB64:cipherHex`.
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SecretCodec {
    /// Build a codec from the configured key material.
    ///
    /// Exactly 32 bytes are used as the key directly; any other length is
    /// treated as a passphrase and hashed with SHA-256.
    pub fn new(key_material: &str) -> Self {
        let bytes = key_material.as_bytes();
        let key: [u8; 32] = if bytes.len() == 32 {
            bytes.try_into().expect("length checked above")
        } else {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hasher.finalize().into()
        };
        Self { key }
    }

    /// Encrypt a plaintext secret into a storable token.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).expect("key is 32 bytes");

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| EncryptError::CipherFailure)?;

        // aes-gcm appends the tag to the ciphertext
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}:{}:{}",
            BASE64.encode(nonce_bytes),
            BASE64.encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt a stored token back into the plaintext secret.
    pub fn decrypt(&self, token: &str) -> Result<String, DecryptError> {
        let mut parts = token.split(':');
        let (nonce_b64, tag_b64, cipher_hex) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(n), Some(t), Some(c), None) => (n, t, c),
            _ => {
                return Err(DecryptError::MalformedToken(
                    "expected nonce:tag:ciphertext".into(),
                ))
            }
        };

        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| DecryptError::MalformedToken(format!("nonce: {e}")))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(DecryptError::MalformedToken("nonce length".into()));
        }
        let tag = BASE64
            .decode(tag_b64)
            .map_err(|e| DecryptError::MalformedToken(format!("tag: {e}")))?;
        if tag.len() != TAG_LEN {
            return Err(DecryptError::MalformedToken("tag length".into()));
        }
        let ciphertext = hex::decode(cipher_hex)
            .map_err(|e| DecryptError::MalformedToken(format!("ciphertext: {e}")))?;

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new_from_slice(&self.key).expect("key is 32 bytes");
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_ref())
            .map_err(|_| DecryptError::AuthenticationFailed)?;

        String::from_utf8(plaintext).map_err(|_| DecryptError::InvalidPlaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let codec = SecretCodec::new("a passphrase of arbitrary length");
        let token = codec.encrypt("hunter2").unwrap();
        assert_eq!(codec.decrypt(&token).unwrap(), "hunter2");
    }

    #[test]
    fn test_roundtrip_unicode() {
        let codec = SecretCodec::new("key");
        let token = codec.encrypt("hesló-ťažké-密码").unwrap();
        assert_eq!(codec.decrypt(&token).unwrap(), "hesló-ťažké-密码");
    }

    #[test]
    fn test_direct_32_byte_key() {
        let codec = SecretCodec::new("0123456789abcdef0123456789abcdef");
        let token = codec.encrypt("secret").unwrap();
        assert_eq!(codec.decrypt(&token).unwrap(), "secret");
    }

    #[test]
    fn test_token_shape() {
        let codec = SecretCodec::new("key");
        let token = codec.encrypt("x").unwrap();
        let parts: Vec<&str> = token.split(':').collect();
        assert_eq!(parts.len(), 3);
        // ciphertext part is hex
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let codec = SecretCodec::new("key");
        let token = codec.encrypt("payload").unwrap();
        let (head, cipher_hex) = token.rsplit_once(':').unwrap();

        // Flip a single bit in the first ciphertext byte
        let mut bytes = hex::decode(cipher_hex).unwrap();
        bytes[0] ^= 0x01;
        let tampered = format!("{}:{}", head, hex::encode(bytes));

        assert!(matches!(
            codec.decrypt(&tampered),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let codec = SecretCodec::new("key-one");
        let other = SecretCodec::new("key-two");
        let token = codec.encrypt("payload").unwrap();
        assert!(matches!(
            other.decrypt(&token),
            Err(DecryptError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let codec = SecretCodec::new("key");
        for bad in ["", "abc", "a:b", "a:b:c:d", "!!!:###:zzz"] {
            assert!(matches!(
                codec.decrypt(bad),
                Err(DecryptError::MalformedToken(_))
            ));
        }
    }

    #[test]
    fn test_nonce_uniqueness() {
        let codec = SecretCodec::new("key");
        let t1 = codec.encrypt("same").unwrap();
        let t2 = codec.encrypt("same").unwrap();
        assert_ne!(t1, t2);
    }
}
