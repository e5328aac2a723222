//! Block-level execution context and tracer options.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::codec::{hex_big_opt, hex_u64};
use crate::types::{Address, Handle, Hash};

/// Fork points to activate on the native side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForkRules {
    pub is_shanghai: bool,
}

impl ForkRules {
    pub fn shanghai() -> Self {
        Self { is_shanghai: true }
    }
}

/// Execution context of an `EvmApply` call.
///
/// Built once by the caller with the `with_*` setters and passed by shared
/// reference; the gateway never mutates it. Omitted numeric fields are
/// defaulted by the native module (gas limit to `i64::MAX`, gas price and
/// block number to zero).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvmContext {
    #[serde(rename = "chainID", with = "hex_u64")]
    pub chain_id: u64,
    pub coinbase: Address,
    #[serde(with = "hex_u64")]
    pub gas_limit: u64,
    #[serde(with = "hex_big_opt", default)]
    pub gas_price: Option<BigUint>,
    #[serde(with = "hex_big_opt", default)]
    pub block_number: Option<BigUint>,
    #[serde(with = "hex_big_opt", default)]
    pub time: Option<BigUint>,
    #[serde(with = "hex_big_opt", default)]
    pub base_fee: Option<BigUint>,
    pub random: Hash,
    #[serde(default)]
    pub rules: ForkRules,
    /// Callback handle answering block-hash lookups.
    #[serde(default)]
    pub block_hash_callback: Option<Handle>,
    /// Tracer handle receiving capture events.
    #[serde(default)]
    pub tracer: Option<Handle>,
    /// Addresses whose invocation is delegated to `external_callback`.
    #[serde(default)]
    pub external_contracts: Vec<Address>,
    /// Callback handle executing calls to `external_contracts`.
    #[serde(default)]
    pub external_callback: Option<Handle>,
    /// Call depth of the outermost frame; non-zero for nested applies.
    #[serde(default)]
    pub initial_depth: u32,
}

impl EvmContext {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn with_coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = coinbase;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_gas_price(mut self, gas_price: impl Into<BigUint>) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }

    pub fn with_block_number(mut self, block_number: impl Into<BigUint>) -> Self {
        self.block_number = Some(block_number.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<BigUint>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_base_fee(mut self, base_fee: impl Into<BigUint>) -> Self {
        self.base_fee = Some(base_fee.into());
        self
    }

    pub fn with_random(mut self, random: Hash) -> Self {
        self.random = random;
        self
    }

    pub fn with_rules(mut self, rules: ForkRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_block_hash_callback(mut self, handle: Handle) -> Self {
        self.block_hash_callback = Some(handle);
        self
    }

    pub fn with_tracer(mut self, handle: Handle) -> Self {
        self.tracer = Some(handle);
        self
    }

    pub fn with_external_contracts(mut self, contracts: Vec<Address>, callback: Handle) -> Self {
        self.external_contracts = contracts;
        self.external_callback = Some(callback);
        self
    }

    pub fn with_initial_depth(mut self, depth: u32) -> Self {
        self.initial_depth = depth;
        self
    }
}

/// Options of a native tracer.
///
/// An empty `tracer` selects the struct logger; otherwise it names a native
/// tracer such as `callTracer`, configured by `tracer_config`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TraceOptions {
    #[serde(default)]
    pub enable_memory: bool,
    #[serde(default)]
    pub disable_stack: bool,
    #[serde(default)]
    pub disable_storage: bool,
    #[serde(default)]
    pub enable_return_data: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tracer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracer_config: Option<serde_json::Value>,
}

impl TraceOptions {
    /// Options selecting a named tracer.
    pub fn named(tracer: impl Into<String>) -> Self {
        Self {
            tracer: tracer.into(),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.tracer_config = Some(config);
        self
    }
}

/// Call-frame kinds reported to `TracerCaptureEnter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TracerOpCode {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

impl TracerOpCode {
    pub fn name(&self) -> &'static str {
        match self {
            TracerOpCode::Call => "CALL",
            TracerOpCode::CallCode => "CALLCODE",
            TracerOpCode::DelegateCall => "DELEGATECALL",
            TracerOpCode::StaticCall => "STATICCALL",
            TracerOpCode::Create => "CREATE",
            TracerOpCode::Create2 => "CREATE2",
        }
    }
}
