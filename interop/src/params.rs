//! Argument payloads of the native methods.
//!
//! Every struct rejects unknown fields, so a host/native schema mismatch
//! surfaces as an operation error instead of silently dropping data.
//! Names follow the method they belong to, e.g. [`BalanceParams`] for
//! `StateAddBalance`, `StateSubBalance` and `StateSetBalance`.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::codec::{hex_big, hex_big_opt, hex_bytes, hex_u64};
use crate::context::{EvmContext, ForkRules, TracerOpCode};
use crate::invocation::Invocation;
use crate::types::{Address, Handle, Hash};

// ── Persistent store ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatabaseParams {
    pub database_handle: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LevelDbParams {
    pub path: String,
    /// Record hash preimages so that dumps can show plain addresses and keys.
    #[serde(default)]
    pub preimages: bool,
}

// ── State view ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateParams {
    pub database_handle: Handle,
    pub root: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HandleParams {
    pub handle: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccountParams {
    pub handle: Handle,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BalanceParams {
    pub handle: Handle,
    pub address: Address,
    #[serde(with = "hex_big")]
    pub amount: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NonceParams {
    pub handle: Handle,
    pub address: Address,
    #[serde(with = "hex_u64")]
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CodeParams {
    pub handle: Handle,
    pub address: Address,
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageParams {
    pub handle: Handle,
    pub address: Address,
    pub key: Hash,
}

/// `StateSetStorage`: a `None` or zero value removes the slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetStorageParams {
    pub handle: Handle,
    pub address: Address,
    pub key: Hash,
    #[serde(default)]
    pub value: Option<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SnapshotParams {
    pub handle: Handle,
    pub revision_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DumpParams {
    pub handle: Handle,
    pub dump_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProofParams {
    pub handle: Handle,
    pub address: Address,
    pub root: Hash,
    #[serde(default)]
    pub storage_keys: Vec<Hash>,
}

// ── Access list ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccessParams {
    pub handle: Handle,
    /// Transaction sender.
    pub address: Address,
    #[serde(default)]
    pub destination: Option<Address>,
    pub coinbase: Address,
    #[serde(default)]
    pub rules: ForkRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotParams {
    pub handle: Handle,
    pub address: Address,
    pub slot: Hash,
}

// ── EVM ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvmParams {
    pub handle: Handle,
    pub invocation: Invocation,
    pub context: EvmContext,
}

// ── Tracer ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerParams {
    pub tracer_handle: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerTxStartParams {
    pub tracer_handle: Handle,
    #[serde(with = "hex_u64")]
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerTxEndParams {
    pub tracer_handle: Handle,
    #[serde(with = "hex_u64")]
    pub rest_gas: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerStartParams {
    pub tracer_handle: Handle,
    #[serde(rename = "stateDB")]
    pub state_db: Handle,
    pub context: EvmContext,
    pub from: Address,
    pub to: Address,
    pub create: bool,
    #[serde(with = "hex_bytes", default)]
    pub input: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas: u64,
    #[serde(with = "hex_big_opt", default)]
    pub value: Option<BigUint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerEndParams {
    pub tracer_handle: Handle,
    #[serde(with = "hex_bytes", default)]
    pub output: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas_used: u64,
    /// Wall-clock duration of the top frame in nanoseconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub err: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerEnterParams {
    pub tracer_handle: Handle,
    pub op_code: TracerOpCode,
    pub from: Address,
    pub to: Address,
    #[serde(with = "hex_bytes", default)]
    pub input: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas: u64,
    #[serde(with = "hex_big_opt", default)]
    pub value: Option<BigUint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TracerExitParams {
    pub tracer_handle: Handle,
    #[serde(with = "hex_bytes", default)]
    pub output: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas_used: u64,
    #[serde(default)]
    pub err: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_params_names() {
        let json = serde_json::to_value(StateParams {
            database_handle: 1,
            root: Hash::ZERO,
        })
        .unwrap();
        assert_eq!(json["databaseHandle"], 1);
        assert_eq!(json["root"], format!("0x{}", "00".repeat(32)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<HandleParams>(r#"{"handle":1,"extra":2}"#).is_err());
        assert!(serde_json::from_str::<DatabaseParams>(r#"{"handle":1}"#).is_err());
    }

    #[test]
    fn test_set_storage_null_value() {
        let json = format!(
            r#"{{"handle":1,"address":"0x{}","key":"0x{}","value":null}}"#,
            "11".repeat(20),
            "22".repeat(32)
        );
        let params: SetStorageParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params.value, None);
    }

    #[test]
    fn test_tracer_start_state_db_name() {
        let params = TracerStartParams {
            tracer_handle: 1,
            state_db: 2,
            context: EvmContext::default(),
            from: Address::ZERO,
            to: Address::ZERO,
            create: false,
            input: vec![],
            gas: 0,
            value: None,
        };
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["stateDB"], 2);
        assert_eq!(json["tracerHandle"], 1);
    }

    #[test]
    fn test_enter_op_code() {
        let json = serde_json::to_value(TracerEnterParams {
            tracer_handle: 1,
            op_code: TracerOpCode::DelegateCall,
            from: Address::ZERO,
            to: Address::ZERO,
            input: vec![],
            gas: 1,
            value: None,
        })
        .unwrap();
        assert_eq!(json["opCode"], "DELEGATECALL");
    }
}
