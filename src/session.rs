//! Bearer/refresh credential pair and its validity window

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::models::TokenResponse;

/// Current credential pair issued by the token endpoint
///
/// A session is valid iff both tokens are non-empty and the current time is
/// strictly before `issued_at + expires_in`. It is never patched field by
/// field: a successful refresh replaces it wholesale.
#[derive(Debug)]
pub struct Session {
    access_token: SecretString,
    refresh_token: SecretString,
    issued_at: DateTime<Utc>,
    expires_in: TimeDelta,
}

impl Default for Session {
    fn default() -> Self {
        Self::empty()
    }
}

impl Session {
    /// An empty, invalid session
    #[must_use]
    pub fn empty() -> Self {
        Self {
            access_token: SecretString::from(String::new()),
            refresh_token: SecretString::from(String::new()),
            issued_at: DateTime::<Utc>::UNIX_EPOCH,
            expires_in: TimeDelta::zero(),
        }
    }

    /// Build a session from its parts
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: TimeDelta,
    ) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            issued_at,
            expires_in,
        }
    }

    /// Build a session from a token endpoint response received at `issued_at`
    #[must_use]
    pub fn from_token(token: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_in = TimeDelta::try_seconds(token.expires_in).unwrap_or(TimeDelta::zero());
        Self::new(token.access_token, token.refresh_token, issued_at, expires_in)
    }

    /// Whether the session cannot be used for API calls right now
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.is_invalid_at(Utc::now())
    }

    /// Whether the session cannot be used for API calls at `now`
    #[must_use]
    pub fn is_invalid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.expose_secret().is_empty()
            || self.refresh_token.expose_secret().is_empty()
        {
            return true;
        }

        self.issued_at
            .checked_add_signed(self.expires_in)
            .is_none_or(|expires_at| now >= expires_at)
    }

    /// Swap in a freshly issued session
    pub fn replace(&mut self, session: Self) {
        *self = session;
    }

    /// Discard both tokens
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// Copy of the access token for an outgoing request, if the session is valid
    #[must_use]
    pub fn bearer(&self) -> Option<SecretString> {
        if self.is_invalid() {
            return None;
        }
        Some(SecretString::from(self.access_token.expose_secret().to_owned()))
    }

    /// Copy of the refresh token, if one has been issued
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        let token = self.refresh_token.expose_secret();
        (!token.is_empty()).then(|| SecretString::from(token.to_owned()))
    }

    /// When the current tokens were issued
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}
