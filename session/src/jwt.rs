//! Minimal JWT claim inspection.
//!
//! Tokens are never verified here; the backend does that. We only peek at
//! the payload to learn when a token stops being useful and who it belongs
//! to, so that an obviously expired session is rejected before any request
//! leaves the machine.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The subset of registered and Cognito claims we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Subject (user id).
    #[serde(default)]
    pub sub: Option<String>,
    /// Cognito access tokens carry the user name here.
    #[serde(default)]
    pub username: Option<String>,
    /// Cognito id tokens carry it here instead.
    #[serde(default, rename = "cognito:username")]
    pub cognito_username: Option<String>,
}

impl TokenClaims {
    /// Expiry as a timestamp, if the claim is present and representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Best available user name.
    pub fn display_name(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.cognito_username.as_deref())
            .or(self.sub.as_deref())
    }
}

/// Decodes the payload segment of a compact JWT.
///
/// Returns `None` for opaque tokens, which are legal bearer tokens for some
/// identity providers. A token that merely has three dotted segments but no
/// base64url JSON payload counts as opaque.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("treating token as opaque, payload is not base64url: {e}");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("treating token as opaque, payload is not JSON claims: {e}");
            None
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_for_test(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(b"sig");
    format!("{header}.{body}.{sig}")
}
