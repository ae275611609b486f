use std::fmt;

use chrono::{DateTime, Utc};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bearer token of the authenticated session. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// The authenticated user the reconciler works for.
///
/// Passed in explicitly on activation and re-validated before every remote call.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub owner_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub access_token: AccessToken,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new(owner_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            email: None,
            full_name: None,
            access_token: AccessToken::new(access_token),
            expires_at: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// A session is usable when it names an owner, carries a token and has not expired.
    pub fn is_valid(&self) -> bool {
        !self.owner_id.is_empty() && !self.access_token.is_empty() && !self.is_expired_at(Utc::now())
    }

    /// Name shown in the header: full name, else the e-mail local part, else "User".
    pub fn display_name(&self) -> String {
        let raw = self
            .full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());

        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => raw,
        }
    }
}
