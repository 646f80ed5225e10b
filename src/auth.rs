//! Caller authentication for the HTTP surface.
//!
//! Every account's bearer token is derived from the service secret:
//! `hex(SHA-256(len || "caller" || len || secret || len || account))`.
//! The operator hands each participant (and the creator) their token out of
//! band; a request acting for an account must present that account's token.

use crate::domain::Address;
use sha2::{Digest, Sha256};
use thiserror::Error;

const CALLER_TAG: &str = "caller";

/// Length-prefixed update, so adjacent fields cannot be shifted into each other.
pub(crate) fn hash_var(hasher: &mut Sha256, data: &str) {
    hasher.update((data.len() as u32).to_le_bytes());
    hasher.update(data.as_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("bearer token does not authenticate {0}")]
    InvalidToken(Address),
}

/// Derives and checks per-account bearer tokens.
#[derive(Debug, Clone)]
pub struct CallerAuthenticator {
    secret: String,
}

impl CallerAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn token_for(&self, account: &Address) -> String {
        let mut hasher = Sha256::new();
        hash_var(&mut hasher, CALLER_TAG);
        hash_var(&mut hasher, &self.secret);
        hash_var(&mut hasher, account.as_str());
        hex::encode(hasher.finalize())
    }

    /// Accept `token` only if it was issued for `account`.
    pub fn authenticate(
        &self,
        account: &Address,
        token: Option<&str>,
    ) -> Result<(), AuthenticationError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthenticationError::MissingToken)?;
        if !self.token_for(account).eq_ignore_ascii_case(token) {
            return Err(AuthenticationError::InvalidToken(account.clone()));
        }
        Ok(())
    }
}
