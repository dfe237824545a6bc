//! JWT validation and token extraction helpers

use axum::http::HeaderValue;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::claims::SupabaseClaims;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Validate an access token issued by the hosted identity provider
pub(crate) fn validate_jwt_token(
    token: &str,
    config: &AuthConfig,
) -> Result<SupabaseClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);

    if let Some(aud) = &config.audience {
        validation.set_audience(&[aud]);
    } else {
        validation.validate_aud = false;
    }

    if let Some(iss) = &config.issuer {
        validation.set_issuer(&[iss]);
    }

    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_ref());

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        AuthError::InvalidToken
    })?;

    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(header: &HeaderValue) -> Result<String, AuthError> {
    let header_str = header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationFormat)?;

    if let Some(token) = header_str.strip_prefix("Bearer ") {
        Ok(token.to_string())
    } else {
        Err(AuthError::InvalidAuthorizationFormat)
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &SupabaseClaims, secret: &str) -> String {
    let header = jsonwebtoken::Header::new(Algorithm::HS256);
    let encoding_key = jsonwebtoken::EncodingKey::from_secret(secret.as_ref());
    jsonwebtoken::encode(&header, claims, &encoding_key).expect("Failed to encode JWT")
}
