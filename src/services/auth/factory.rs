/// Factory: build the bearer `TokenVerifier` from application `Config`.
use std::sync::Arc;

use crate::config::Auth0Config;
use crate::error::AppError;
use crate::services::auth::{HttpUserInfoClient, JwksCache, TokenVerifier, VerifierSettings};

/// `None` when bearer verification is disabled.
pub fn build_token_verifier(config: &Auth0Config) -> Result<Option<Arc<TokenVerifier>>, AppError> {
    if !config.enabled {
        tracing::info!("Auth0 bearer verification disabled");
        return Ok(None);
    }

    let keys = JwksCache::new().map_err(AppError::internal)?;
    let userinfo = HttpUserInfoClient::new(config.userinfo_url()).map_err(AppError::internal)?;

    let verifier = TokenVerifier::new(VerifierSettings::from_config(config), Arc::new(keys))
        .with_userinfo(Arc::new(userinfo));

    tracing::info!(
        domain = %config.domain,
        audience = %config.audience,
        "Auth0 bearer verification enabled"
    );
    Ok(Some(Arc::new(verifier)))
}
