use agora_shared::User;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ThreadError, ThreadResult};
use crate::services::{Identity, Viewer};

// ── JWT Claims ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

// ── Fixed viewer ──

/// Identity with a fixed viewer, or nobody.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    viewer: Option<Viewer>,
}

impl StaticIdentity {
    pub fn signed_in(viewer: Viewer) -> Self {
        Self {
            viewer: Some(viewer),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl Identity for StaticIdentity {
    fn viewer(&self) -> ThreadResult<Viewer> {
        self.viewer.clone().ok_or(ThreadError::AuthenticationRequired)
    }
}

// ── Bearer token ──

/// Reads the viewer out of a bearer JWT issued by the forum API.
///
/// The client does not hold the signing secret, so only the token's shape and
/// expiry are checked here. The server still verifies every request.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentity {
    token: Option<String>,
}

impl TokenIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl Identity for TokenIdentity {
    fn viewer(&self) -> ThreadResult<Viewer> {
        let token = self
            .token
            .as_deref()
            .map(|t| t.strip_prefix("Bearer ").unwrap_or(t))
            .ok_or(ThreadError::AuthenticationRequired)?;

        let claims = read_claims(token)?;
        Ok(Viewer {
            user: User {
                id: claims.sub,
                username: claims.username,
                avatar_url: claims.avatar_url,
            },
            token: token.to_string(),
        })
    }
}

fn read_claims(token: &str) -> ThreadResult<Claims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();

    decode::<Claims>(token, &DecodingKey::from_secret(b""), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejecting bearer token");
            ThreadError::AuthenticationRequired
        })
}
