use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::role::Role;

// ============================================================================
// Claims
// ============================================================================

/// Session token payload.
///
/// `user_id` is absent on tokens issued before identity binding; such tokens
/// authenticate but cannot authorize identity-bound operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("missing claim: {0}")]
    MissingClaim(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) => TokenError::MissingClaim(claim.clone()),
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        tracing::debug!(error = %err, "Rejected session token");
        AppError::InvalidCredentials
    }
}

// ============================================================================
// Token Authority
// ============================================================================

/// Issues and verifies HS256 session tokens with a single process-wide secret.
pub struct TokenAuthority {
    secret: SecretString,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue an identity-bound token carrying `userId`.
    pub fn issue(&self, subject: &str, role: Role, user_id: i64) -> AppResult<String> {
        self.issue_at(subject, role, Some(user_id), OffsetDateTime::now_utc())
    }

    /// Issue a token without `userId`. Kept for callers that predate identity
    /// binding; prefer [`TokenAuthority::issue`].
    pub fn issue_without_user_id(&self, subject: &str, role: Role) -> AppResult<String> {
        self.issue_at(subject, role, None, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        role: Role,
        user_id: Option<i64>,
        now: OffsetDateTime,
    ) -> AppResult<String> {
        let iat = now.unix_timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            user_id,
            iat,
            exp: iat + self.ttl.whole_seconds(),
        };
        let header = Header::new(Algorithm::HS256);
        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Decode and verify the signature. Expiry is not checked here; see
    /// [`TokenAuthority::is_expired`].
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(TokenError::from)
    }

    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.parse(token).map(|claims| claims.sub)
    }

    pub fn extract_role(&self, token: &str) -> Result<String, TokenError> {
        self.parse(token).map(|claims| claims.role)
    }

    /// Fails with `MissingClaim` on legacy tokens without `userId`.
    pub fn extract_user_id(&self, token: &str) -> Result<i64, TokenError> {
        self.parse(token)?
            .user_id
            .ok_or_else(|| TokenError::MissingClaim("userId".into()))
    }

    pub fn is_expired(&self, token: &str) -> Result<bool, TokenError> {
        self.is_expired_at(token, OffsetDateTime::now_utc())
    }

    pub fn is_expired_at(&self, token: &str, now: OffsetDateTime) -> Result<bool, TokenError> {
        Ok(self.parse(token)?.is_expired_at(now))
    }

    /// True iff the subject matches and the token has not expired.
    pub fn validate(&self, token: &str, expected_subject: &str) -> Result<bool, TokenError> {
        self.validate_at(token, expected_subject, OffsetDateTime::now_utc())
    }

    pub fn validate_at(
        &self,
        token: &str,
        expected_subject: &str,
        now: OffsetDateTime,
    ) -> Result<bool, TokenError> {
        let claims = self.parse(token)?;
        Ok(claims.sub == expected_subject && !claims.is_expired_at(now))
    }
}
