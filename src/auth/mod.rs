use crate::models::opt_string_or_number;
use crate::storage::{KeyValueStore, StorageError, TOKEN_KEY};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::rc::Rc;

/// Fields read from the bearer token payload. The signature is the server's business.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Claims {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Credential {
    token: String,
    claims: Claims,
}

impl Credential {
    /// An unreadable payload still yields a credential; only the claims are lost.
    pub fn from_token(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return None;
        }
        let claims = decode_claims(&token).unwrap_or_default();
        Some(Self { token, claims })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stable per-user key for local drafts.
    pub fn user_key(&self) -> String {
        let c = &self.claims;
        c.sub
            .as_deref()
            .or(c.email.as_deref())
            .or(c.username.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("anon")
            .to_string()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.claims
            .username
            .as_deref()
            .or(self.claims.email.as_deref())
    }

    /// A token without `exp` never expires locally; the server still decides.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.claims
            .exp
            .is_some_and(|exp| exp.saturating_mul(1000) <= now_ms)
    }
}

fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_base64url(payload)?;
    serde_json::from_slice(&bytes).ok()
}

/// JWT segments are unpadded base64url; a padded segment is tolerated.
fn decode_base64url(input: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(input.trim_end_matches('=')).ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub(crate) enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

/// Register-form meter: 25 points each for length >= 8, an uppercase letter,
/// a digit and a symbol.
pub(crate) fn password_strength(password: &str) -> (u8, PasswordStrength) {
    let checks = [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    let score = checks.iter().filter(|ok| **ok).count() as u8 * 25;
    let label = match score {
        0..=49 => PasswordStrength::Weak,
        50..=74 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    };
    (score, label)
}

/// Persists the bearer token between page loads.
#[derive(Clone)]
pub(crate) struct AuthStore {
    store: Rc<dyn KeyValueStore>,
}

impl AuthStore {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<Credential> {
        self.store
            .get_item(TOKEN_KEY)
            .and_then(|token| Credential::from_token(token))
    }

    pub fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.store.set_item(TOKEN_KEY, credential.token())
    }

    pub fn clear(&self) {
        self.store.remove_item(TOKEN_KEY);
    }
}
