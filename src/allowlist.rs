//! Merkle allow-list verification.
//!
//! Leaves are `SHA-256(0x00 || participant)`, internal nodes are
//! `SHA-256(0x01 || min(a, b) || max(a, b))`. Sorting each pair means a proof
//! is just the list of sibling hashes, without left/right flags. Odd layers
//! duplicate their last node.

use crate::domain::Address;
use sha2::{Digest, Sha256};
use thiserror::Error;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

pub type Hash32 = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllowListError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Root of an allow-list tree. The all-zero root disables the allow-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MerkleRoot(pub Hash32);

impl MerkleRoot {
    pub const ZERO: MerkleRoot = MerkleRoot([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn from_hex(s: &str) -> Result<Self, AllowListError> {
        parse_hash(s).map(MerkleRoot)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Parse a 32-byte hash from hex, with or without a `0x` prefix.
pub fn parse_hash(s: &str) -> Result<Hash32, AllowListError> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed).map_err(|e| AllowListError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| AllowListError::InvalidLength(len))
}

/// Parse every element of a hex-encoded proof.
pub fn parse_proof(proof: &[String]) -> Result<Vec<Hash32>, AllowListError> {
    proof.iter().map(|p| parse_hash(p)).collect()
}

/// Checks that a participant belongs to the allow-list committed by `root`.
pub trait AllowListVerifier: Send + Sync {
    fn verify(&self, proof: &[Hash32], root: &MerkleRoot, participant: &Address) -> bool;
}

/// SHA-256 sorted-pair Merkle tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleAllowList;

impl MerkleAllowList {
    pub fn leaf_hash(participant: &Address) -> Hash32 {
        let mut hasher = Sha256::new();
        hasher.update([LEAF_PREFIX]);
        hasher.update(participant.as_str().as_bytes());
        hasher.finalize().into()
    }

    fn node_hash(a: &Hash32, b: &Hash32) -> Hash32 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update([NODE_PREFIX]);
        hasher.update(lo);
        hasher.update(hi);
        hasher.finalize().into()
    }

    fn next_layer(layer: &[Hash32]) -> Vec<Hash32> {
        layer
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => Self::node_hash(left, right),
                [single] => Self::node_hash(single, single),
                _ => unreachable!("chunks(2) yields one or two elements"),
            })
            .collect()
    }

    /// Root committing to `participants`, in the given order.
    pub fn root(participants: &[Address]) -> MerkleRoot {
        if participants.is_empty() {
            return MerkleRoot::ZERO;
        }
        let mut layer: Vec<Hash32> = participants.iter().map(Self::leaf_hash).collect();
        while layer.len() > 1 {
            layer = Self::next_layer(&layer);
        }
        MerkleRoot(layer[0])
    }

    /// Inclusion proof for `participant`, or `None` if it is not listed.
    pub fn proof(participants: &[Address], participant: &Address) -> Option<Vec<Hash32>> {
        let mut index = participants.iter().position(|p| p == participant)?;
        let mut layer: Vec<Hash32> = participants.iter().map(Self::leaf_hash).collect();
        let mut proof = Vec::new();
        while layer.len() > 1 {
            let sibling = layer.get(index ^ 1).unwrap_or(&layer[index]);
            proof.push(*sibling);
            layer = Self::next_layer(&layer);
            index /= 2;
        }
        Some(proof)
    }
}

impl AllowListVerifier for MerkleAllowList {
    fn verify(&self, proof: &[Hash32], root: &MerkleRoot, participant: &Address) -> bool {
        let computed = proof
            .iter()
            .fold(Self::leaf_hash(participant), |acc, sibling| {
                Self::node_hash(&acc, sibling)
            });
        computed == root.0
    }
}
