//! Short-lived request tokens for the remote conversion engine.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Token validity in seconds.
const TOKEN_TTL_SECS: i64 = 300;

/// Claims carried on a conversion request token.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RequestClaims {
    /// Issuer.
    pub iss: String,
    /// Audience (the remote engine base URL).
    pub aud: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// Mint a 5-minute HS256 token for one request to the remote engine.
pub(crate) fn mint(secret: &str, audience: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = RequestClaims {
        iss: "docforge-pipeline".to_string(),
        aud: audience.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
