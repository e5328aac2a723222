//! Structured result payloads.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::codec::{hex_big, hex_u64};
use crate::types::{Address, Hash};

/// Result of `TracerResult`: the tracer's JSON output, shape depends on the
/// tracer kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TracerResult {
    #[serde(default)]
    pub result: serde_json::Value,
}

/// One step of a Merkle inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofNode {
    pub sibling: Hash,
    /// `true` when the proven node is the left child at this level.
    pub left: bool,
}

/// Storage slot proof against an account's storage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProof {
    pub key: Hash,
    pub value: Hash,
    #[serde(default)]
    pub proof: Vec<ProofNode>,
}

/// Result of `StateGetProof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofAccountResult {
    pub address: Address,
    #[serde(default)]
    pub account_proof: Vec<ProofNode>,
    #[serde(with = "hex_big")]
    pub balance: BigUint,
    pub code_hash: Hash,
    #[serde(with = "hex_u64")]
    pub nonce: u64,
    pub storage_hash: Hash,
    #[serde(default)]
    pub storage_proof: Vec<StorageProof>,
}

/// Native-side log record forwarded to the log callback.
///
/// `lvl` and `msg` are fixed; all other keys are structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub lvl: String,
    #[serde(default)]
    pub msg: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}
