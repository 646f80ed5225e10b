//! Delegated deposits authorized by a pre-signed permit.
//!
//! A permit commits to owner, amount, nonce and deadline. The reference
//! authorizer signs with a shared secret:
//! `hex(SHA-256(len || secret || len || owner || amount || nonce || deadline))`.
//!
//! Spent nonces are recorded by the stream store in the same commit as the
//! deposit they authorized.

use crate::auth::hash_var;
use crate::domain::{Address, TimeMs};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Pre-authorization for a deposit on behalf of `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositPermit {
    pub owner: Address,
    pub amount: u128,
    pub nonce: u64,
    pub deadline: TimeMs,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("delegated deposits are not enabled")]
    Disabled,
    #[error("permit expired at {deadline}, now {now}")]
    Expired { deadline: TimeMs, now: TimeMs },
    #[error("permit signature is invalid")]
    InvalidSignature,
    #[error("permit nonce {0} was already used")]
    NonceUsed(u64),
}

/// Validates deposit permits. Verification never changes state.
#[async_trait]
pub trait DepositAuthorizer: Send + Sync {
    /// Check signature and deadline. Nonce reuse is caught by the store.
    async fn verify(&self, permit: &DepositPermit, now: TimeMs) -> Result<(), AuthorizationError>;
}

/// Shared-secret permit authorizer.
#[derive(Debug)]
pub struct SharedSecretAuthorizer {
    secret: String,
}

impl SharedSecretAuthorizer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signature the authorizer expects for these permit fields.
    pub fn sign(&self, owner: &Address, amount: u128, nonce: u64, deadline: TimeMs) -> String {
        let mut hasher = Sha256::new();
        hash_var(&mut hasher, &self.secret);
        hash_var(&mut hasher, owner.as_str());
        hasher.update(amount.to_le_bytes());
        hasher.update(nonce.to_le_bytes());
        hasher.update(deadline.as_ms().to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl DepositAuthorizer for SharedSecretAuthorizer {
    async fn verify(&self, permit: &DepositPermit, now: TimeMs) -> Result<(), AuthorizationError> {
        if now > permit.deadline {
            return Err(AuthorizationError::Expired {
                deadline: permit.deadline,
                now,
            });
        }
        let expected = self.sign(&permit.owner, permit.amount, permit.nonce, permit.deadline);
        if !expected.eq_ignore_ascii_case(permit.signature.trim()) {
            return Err(AuthorizationError::InvalidSignature);
        }
        Ok(())
    }
}
