use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::identity::{AuthenticatedUser, Profile};
use super::jwks::{KeySetError, KeySetProvider};
use super::userinfo::UserInfoClient;
use crate::config::Auth0Config;

/// Only RSA-family signatures are accepted.
pub const RSA_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

// Errors returned by access-token verification + claim validation.
// The specific reason is logged; clients only ever see a generic 401.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),
    #[error("unexpected signing method: {0:?}")]
    UnexpectedAlgorithm(Algorithm),
    #[error("kid not found in token header")]
    MissingKid,
    #[error(transparent)]
    KeySet(#[from] KeySetError),
    #[error("key with kid {0} not found")]
    UnknownKey(String),
    #[error("unusable signing key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),
    #[error("jwt verification failed: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),
    #[error("audience not found in token")]
    MissingAudience,
    #[error("audience mismatch: expected {expected}, got {actual}")]
    AudienceMismatch { expected: String, actual: String },
    #[error("issuer not found in token")]
    MissingIssuer,
    #[error("issuer mismatch: got {0}")]
    IssuerMismatch(String),
    #[error("sub (subject) not found in token")]
    MissingSubject,
}

/// Access token (JWT) claims.
///
/// NOTE:
/// - `aud` can be a string or an array; only the string or the first array element
///   is compared against the configured audience.
/// - `exp`/`nbf` are checked by `jsonwebtoken` itself.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Value,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(flatten)]
    pub profile: Profile,
}

impl AccessTokenClaims {
    fn primary_audience(&self) -> Option<&str> {
        match &self.aud {
            Value::String(s) => Some(s),
            Value::Array(values) => values.first().and_then(Value::as_str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    pub jwks_url: String,
    pub audience: String,
    pub issuers: Vec<String>,
    pub leeway_seconds: u64,
}

impl VerifierSettings {
    pub fn from_config(config: &Auth0Config) -> Self {
        Self {
            jwks_url: config.jwks_url(),
            audience: config.audience.clone(),
            issuers: config.issuers().to_vec(),
            leeway_seconds: config.leeway_seconds,
        }
    }
}

/// RSA access-token verifier backed by a remote key set.
#[derive(Clone)]
pub struct TokenVerifier {
    settings: VerifierSettings,
    keys: Arc<dyn KeySetProvider>,
    userinfo: Option<Arc<dyn UserInfoClient>>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("settings", &self.settings)
            .field("userinfo", &self.userinfo.is_some())
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(settings: VerifierSettings, keys: Arc<dyn KeySetProvider>) -> Self {
        Self {
            settings,
            keys,
            userinfo: None,
        }
    }

    pub fn with_userinfo(mut self, client: Arc<dyn UserInfoClient>) -> Self {
        self.userinfo = Some(client);
        self
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Resolve the verification key for `kid`, refreshing the key set once on a miss.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, TokenError> {
        let url = &self.settings.jwks_url;

        let keys = self.keys.key_set(url).await?;
        let keys = match keys.find(kid) {
            Some(_) => keys,
            None => {
                tracing::debug!(kid, "kid not in cached key set, refreshing");
                self.keys.refresh(url).await?
            }
        };

        let jwk = keys
            .find(kid)
            .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))?;
        DecodingKey::from_jwk(jwk).map_err(TokenError::InvalidKey)
    }

    /// Verify the signature and time-based claims (`exp` with leeway, `nbf`).
    pub async fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(TokenError::Malformed)?;
        if !RSA_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::UnexpectedAlgorithm(header.alg));
        }
        let kid = header.kid.as_deref().ok_or(TokenError::MissingKid)?;

        let key = self.decoding_key(kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.settings.leeway_seconds;
        validation.validate_nbf = true;
        // audience and issuer rules are applied in `verify_strict`
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
            .map_err(TokenError::Jwt)?;
        Ok(data.claims)
    }

    /// Verify + audience, issuer and subject checks.
    pub async fn verify_strict(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let claims = self.verify(token).await?;

        let aud = claims.primary_audience().ok_or(TokenError::MissingAudience)?;
        if aud != self.settings.audience {
            return Err(TokenError::AudienceMismatch {
                expected: self.settings.audience.clone(),
                actual: aud.to_string(),
            });
        }

        let iss = claims.iss.as_deref().ok_or(TokenError::MissingIssuer)?;
        if !self.settings.issuers.iter().any(|expected| expected == iss) {
            return Err(TokenError::IssuerMismatch(iss.to_string()));
        }

        if claims.profile.sub().is_none() {
            return Err(TokenError::MissingSubject);
        }

        Ok(claims)
    }

    /// Verify the token and build the request identity from its claims.
    ///
    /// This is the entry-point for the required-bearer middleware.
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, TokenError> {
        let claims = self.verify_strict(token).await?;
        let sub = claims.profile.sub().ok_or(TokenError::MissingSubject)?;
        Ok(AuthenticatedUser::from_profile(sub, &claims.profile))
    }

    /// Like [`authenticate`](Self::authenticate), then fill a missing name/email from
    /// the userinfo endpoint. Userinfo failures are not errors.
    pub async fn authenticate_with_userinfo(
        &self,
        token: &str,
    ) -> Result<AuthenticatedUser, TokenError> {
        let mut user = self.authenticate(token).await?;

        if let Some(client) = &self.userinfo
            && user.needs_enrichment()
        {
            match client.fetch(token).await {
                Ok(info) => user.merge(&info),
                Err(err) => {
                    tracing::debug!(error = %err, "failed to fetch userinfo, using token claims")
                }
            }
        }

        Ok(user)
    }
}
