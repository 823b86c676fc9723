use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::Deserialize;
use thiserror::Error;

use crate::error::{AppError, UnauthorizedReason};

/// Only algorithm accepted for session tokens.
pub const SESSION_ALGORITHM: Algorithm = Algorithm::HS256;

// Errors returned by session-token verification.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no bearer token presented")]
    Missing,
    #[error("token has expired")]
    Expired,
    #[error("jwt verification failed: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),
    #[error("empty 'sub' claim")]
    EmptySubject,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Jwt(e),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        let reason = match e {
            TokenError::Missing => UnauthorizedReason::MissingCredential,
            TokenError::Expired => UnauthorizedReason::Expired,
            TokenError::Jwt(_) | TokenError::EmptySubject => UnauthorizedReason::Invalid,
        };
        AppError::Unauthorized(reason)
    }
}

/// Claims read after verification. `exp` is required and checked by
/// `jsonwebtoken` itself, so only `sub` is kept.
#[derive(Debug, Clone, Deserialize)]
struct SessionClaims {
    sub: String,
}

/// HS256 session-token verifier.
///
/// - Stateless after construction; share it behind an `Arc`.
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenValidator")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl TokenValidator {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Self {
        // `Validation::new` pins the accepted algorithm list to exactly this one,
        // so a header naming anything else fails with `InvalidAlgorithm`.
        let mut validation = Validation::new(SESSION_ALGORITHM);
        validation.leeway = leeway_seconds;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify `token` and return the subject it names.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let data =
            jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;

        let sub = data.claims.sub.trim();
        if sub.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        Ok(sub.to_string())
    }
}
