//! Connection authentication.
//!
//! [`AuthGate`] verifies the HS256 bearer token a client presents when it
//! opens a WebSocket and turns it into an [`Identity`]. It has no side
//! effects: rejecting the connection is the caller's job.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Subject used for tokens minted by `GET /token`.
pub const DEMO_SUBJECT: &str = "demo-user";

/// JWT claims carried by a gateway credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject the token was issued to.
    #[serde(default)]
    pub sub: String,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Issued-at, seconds since the epoch.
    #[serde(default)]
    pub iat: i64,
    /// Expiration, seconds since the epoch.
    pub exp: i64,
}

/// Authenticated principal attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Token subject.
    pub subject: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            scopes: claims.scopes,
        }
    }
}

/// Verifies and issues HS256 tokens against a shared secret.
pub struct AuthGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_secs: i64,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    /// Creates a gate for the given shared secret.
    #[must_use]
    pub fn new(secret: &str, token_ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl_secs,
        }
    }

    /// Validates a credential.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] if the token is absent, has a
    /// bad signature, is malformed or has expired.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity, GatewayError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(GatewayError::Unauthorized);
        };
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| Identity::from(data.claims))
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                GatewayError::Unauthorized
            })
    }

    /// Signs a token for `subject` with the given scopes, valid for the
    /// configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn issue(&self, subject: &str, scopes: &[&str]) -> Result<String, GatewayError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            iat: now,
            exp: now.saturating_add(self.token_ttl_secs),
        };
        self.sign(&claims)
    }

    /// Signs a demo token (`demo-user`, scope `basic`).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn issue_demo(&self) -> Result<String, GatewayError> {
        self.issue(DEMO_SUBJECT, &["basic"])
    }

    /// Signs arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, GatewayError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("token signing failed: {e}")))
    }
}
