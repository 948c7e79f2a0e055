//! Signing engine: certificate-backed signatures over fixed-layout
//! artifacts.
//!
//! The stored unlock secret is decrypted just before use, the container is
//! unlocked in memory, and an RSA-SHA256 signature over the artifact bytes
//! is embedded as an append-only trailer block. The original artifact bytes
//! are never rewritten.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::vault::{self, ParseError};
use shared::secret::{DecryptError, SecretCodec};

/// Marker opening every signature trailer line.
const TRAILER_MARKER: &[u8] = b"%DocForge-Sig:";

/// Errors raised while signing. Fatal for the affected item; a document
/// that required a signature and did not get one is `failed`, never demoted
/// to unsigned-but-ready.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Unlock secret unreadable: {0}")]
    SecretDecrypt(#[from] DecryptError),

    #[error("Key-pair container unlock failed: {0}")]
    ContainerUnlock(#[from] ParseError),

    #[error("Signature creation failed: {0}")]
    Signature(String),
}

/// Tag recorded on signature rows produced by this engine.
pub const PROVIDER: &str = "local_rsa";

/// Applies certificate-backed signatures to artifacts.
pub struct SigningEngine {
    codec: SecretCodec,
}

impl SigningEngine {
    pub fn new(codec: SecretCodec) -> Self {
        Self { codec }
    }

    /// Sign `artifact` with the key pair in `container`, unlocked by the
    /// encrypted secret. Returns the artifact with the signature trailer
    /// appended.
    pub fn sign(
        &self,
        artifact: &[u8],
        container: &[u8],
        encrypted_secret: &str,
    ) -> Result<Vec<u8>, SigningError> {
        let password = self.codec.decrypt(encrypted_secret)?;
        let pair = vault::unlock(container, &password)?;

        let key = RsaPrivateKey::from_pkcs8_der(&pair.private_key_der)
            .map_err(|e| SigningError::Signature(e.to_string()))?;
        let signing_key = SigningKey::<Sha256>::new(key);
        let signature = signing_key
            .try_sign(artifact)
            .map_err(|e| SigningError::Signature(e.to_string()))?
            .to_vec();

        let info = vault::parse_certificate(&pair.certificate_der)?;
        debug!(serial = %info.serial, subject = %info.subject, "Artifact signed");

        Ok(append_signature_trailer(artifact, &signature, &info.serial))
    }
}

/// Append the signature trailer block: base64 signature, certificate
/// serial, artifact digest, and a fresh end-of-file marker.
pub fn append_signature_trailer(artifact: &[u8], signature: &[u8], serial: &str) -> Vec<u8> {
    let digest = hex::encode(Sha256::digest(artifact));

    let mut out = Vec::with_capacity(artifact.len() + signature.len() * 2 + 160);
    out.extend_from_slice(artifact);
    if !artifact.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(TRAILER_MARKER);
    out.extend_from_slice(format!(" {}\n", BASE64.encode(signature)).as_bytes());
    out.extend_from_slice(format!("%DocForge-Sig-Serial: {serial}\n").as_bytes());
    out.extend_from_slice(format!("%DocForge-Sig-Digest: sha256:{digest}\n").as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Whether an artifact already carries a signature trailer.
pub fn has_signature_trailer(artifact: &[u8]) -> bool {
    artifact
        .windows(TRAILER_MARKER.len())
        .any(|w| w == TRAILER_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNER_CONTAINER: &[u8] = include_bytes!("../tests/fixtures/signing.p12");
    const SIGNER_PASSWORD: &str = "test-password";

    #[test]
    fn test_sign_embeds_trailer() {
        let codec = SecretCodec::new("key");
        let token = codec.encrypt(SIGNER_PASSWORD).unwrap();
        let engine = SigningEngine::new(codec);

        let artifact = b"%PDF-1.7 body";
        let signed = engine.sign(artifact, SIGNER_CONTAINER, &token).unwrap();

        assert!(signed.starts_with(artifact));
        assert!(has_signature_trailer(&signed));
        assert!(signed.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn test_signature_verifies_against_container_certificate() {
        use rsa::pkcs1v15::{Signature, VerifyingKey};
        use rsa::pkcs8::DecodePublicKey;
        use rsa::signature::Verifier;
        use rsa::RsaPublicKey;
        use x509_parser::prelude::{FromDer, X509Certificate};

        let artifact = b"%PDF-1.7 body";
        let codec = SecretCodec::new("key");
        let token = codec.encrypt(SIGNER_PASSWORD).unwrap();
        let signed = SigningEngine::new(codec)
            .sign(artifact, SIGNER_CONTAINER, &token)
            .unwrap();

        // Pull the signature back out of the trailer.
        let text = String::from_utf8(signed).unwrap();
        let line = text
            .lines()
            .find(|l| l.starts_with("%DocForge-Sig: "))
            .unwrap();
        let sig_bytes = BASE64
            .decode(line.trim_start_matches("%DocForge-Sig: "))
            .unwrap();

        let pair = vault::unlock(SIGNER_CONTAINER, SIGNER_PASSWORD).unwrap();
        let (_, cert) = X509Certificate::from_der(&pair.certificate_der).unwrap();
        let public = RsaPublicKey::from_public_key_der(cert.public_key().raw).unwrap();
        VerifyingKey::<Sha256>::new(public)
            .verify(artifact, &Signature::try_from(sig_bytes.as_slice()).unwrap())
            .unwrap();
    }

    #[test]
    fn test_trailer_preserves_original_bytes() {
        let artifact = b"%PDF-1.7 fake content %%EOF".to_vec();
        let signed = append_signature_trailer(&artifact, &[1, 2, 3, 4], "0a:1b");

        assert!(signed.starts_with(&artifact));
        assert!(signed.ends_with(b"%%EOF\n"));
        assert!(has_signature_trailer(&signed));
        assert!(!has_signature_trailer(&artifact));
    }

    #[test]
    fn test_trailer_records_serial_and_digest() {
        let artifact = b"%PDF-1.7 body\n";
        let signed = append_signature_trailer(artifact, &[9, 9], "de:ad");
        let text = String::from_utf8(signed).unwrap();

        assert!(text.contains("%DocForge-Sig-Serial: de:ad\n"));
        let digest = hex::encode(Sha256::digest(artifact));
        assert!(text.contains(&format!("%DocForge-Sig-Digest: sha256:{digest}\n")));
    }

    #[test]
    fn test_corrupted_secret_fails() {
        let engine = SigningEngine::new(SecretCodec::new("key"));
        let err = engine
            .sign(b"%PDF-1.7", b"container", "not-a-valid-token")
            .unwrap_err();
        assert!(matches!(err, SigningError::SecretDecrypt(_)));
    }

    #[test]
    fn test_wrong_codec_key_fails_before_container() {
        let storing_codec = SecretCodec::new("key-at-store-time");
        let token = storing_codec.encrypt("container-password").unwrap();

        // Key misconfigured at sign time
        let engine = SigningEngine::new(SecretCodec::new("different-key"));
        let err = engine.sign(b"%PDF-1.7", b"container", &token).unwrap_err();
        assert!(matches!(err, SigningError::SecretDecrypt(_)));
    }

    #[test]
    fn test_garbage_container_fails_unlock() {
        let codec = SecretCodec::new("key");
        let token = codec.encrypt("password").unwrap();

        let engine = SigningEngine::new(codec);
        let err = engine
            .sign(b"%PDF-1.7", b"not a pkcs12 container", &token)
            .unwrap_err();
        assert!(matches!(err, SigningError::ContainerUnlock(_)));
    }
}
