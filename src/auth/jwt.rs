use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::AppState;

/// Bearer token payload: subject identity plus expiry window.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
}

/// Signing and verification keys with the token policy. Constructed from
/// config and passed into the auth service; no ambient global signer.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let jwt = &state.config.jwt;
        Self::new(&jwt.secret, jwt.issuer.clone(), Duration::hours(jwt.ttl_hours))
    }
}

impl JwtKeys {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn issue(&self, subject: &str) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Internal(e.into()))?;
        debug!(subject = %subject, "token issued");
        Ok(token)
    }

    /// Returns the subject if the signature is valid and the token is not
    /// expired. Malformed, tampered and expired tokens all collapse into
    /// `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<String> {
        let mut validation = Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            Error::InvalidToken
        })?;
        Ok(data.claims.sub)
    }
}
