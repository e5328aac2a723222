//! Contract invocation payloads.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::codec::{hex_big_opt, hex_bytes, hex_u64};
use crate::types::Address;

/// A call or contract creation. `callee == None` means create, with `input`
/// as the init code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Invocation {
    pub caller: Address,
    #[serde(default)]
    pub callee: Option<Address>,
    #[serde(with = "hex_big_opt", default)]
    pub value: Option<BigUint>,
    #[serde(with = "hex_bytes", default)]
    pub input: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas: u64,
    #[serde(default)]
    pub read_only: bool,
}

impl Invocation {
    /// Message call from `caller` to `callee`.
    pub fn call(caller: Address, callee: Address, input: Vec<u8>, gas: u64) -> Self {
        Self {
            caller,
            callee: Some(callee),
            value: None,
            input,
            gas,
            read_only: false,
        }
    }

    /// Contract creation running `code` as init code.
    pub fn create(caller: Address, code: Vec<u8>, gas: u64) -> Self {
        Self {
            caller,
            callee: None,
            value: None,
            input: code,
            gas,
            read_only: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<BigUint>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_create(&self) -> bool {
        self.callee.is_none()
    }

    /// Attach the call depth, producing the payload of an external-call callback.
    pub fn at_depth(self, depth: u32) -> ExternalInvocation {
        ExternalInvocation {
            caller: self.caller,
            callee: self.callee,
            value: self.value,
            input: self.input,
            gas: self.gas,
            read_only: self.read_only,
            depth,
        }
    }
}

/// Invocation handed to the host's external-call callback, with the nesting
/// depth at which the native engine reached the external contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalInvocation {
    pub caller: Address,
    #[serde(default)]
    pub callee: Option<Address>,
    #[serde(with = "hex_big_opt", default)]
    pub value: Option<BigUint>,
    #[serde(with = "hex_bytes", default)]
    pub input: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub gas: u64,
    #[serde(default)]
    pub read_only: bool,
    pub depth: u32,
}

impl ExternalInvocation {
    /// The invocation without its depth.
    pub fn invocation(&self) -> Invocation {
        Invocation {
            caller: self.caller,
            callee: self.callee,
            value: self.value.clone(),
            input: self.input.clone(),
            gas: self.gas,
            read_only: self.read_only,
        }
    }
}

/// Outcome of an invocation.
///
/// `execution_error` is empty on success. A revert carries `reverted == true`
/// and the revert data in `return_data`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResult {
    #[serde(with = "hex_bytes", default)]
    pub return_data: Vec<u8>,
    #[serde(with = "hex_u64")]
    pub left_over_gas: u64,
    #[serde(default)]
    pub execution_error: String,
    #[serde(default)]
    pub reverted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
}

impl InvocationResult {
    pub fn success(return_data: Vec<u8>, left_over_gas: u64) -> Self {
        Self {
            return_data,
            left_over_gas,
            ..Default::default()
        }
    }

    /// Failed execution. All gas is consumed.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            execution_error: error.into(),
            ..Default::default()
        }
    }

    pub fn reverted(return_data: Vec<u8>, left_over_gas: u64) -> Self {
        Self {
            return_data,
            left_over_gas,
            execution_error: "execution reverted".to_string(),
            reverted: true,
            contract_address: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.execution_error.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[test]
    fn test_invocation_wire_names() {
        let inv = Invocation::call(addr(1), addr(2), vec![0xca, 0xfe], 50_000).with_value(7u32);
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["caller"], format!("0x{}", "01".repeat(20)));
        assert_eq!(json["value"], "0x7");
        assert_eq!(json["input"], "0xcafe");
        assert_eq!(json["gas"], "0xc350");
        assert_eq!(json["readOnly"], false);
    }

    #[test]
    fn test_create_has_no_callee() {
        let inv = Invocation::create(addr(1), vec![0x60], 1);
        assert!(inv.is_create());
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json["callee"].is_null());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = format!(r#"{{"caller":"{}","gas":"0x1","bogus":1}}"#, addr(1));
        assert!(serde_json::from_str::<Invocation>(&json).is_err());
    }

    #[test]
    fn test_external_invocation_depth() {
        let ext = Invocation::call(addr(1), addr(2), vec![], 10).at_depth(3);
        let json = serde_json::to_string(&ext).unwrap();
        let back: ExternalInvocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.depth, 3);
        assert_eq!(back.invocation().callee, Some(addr(2)));
    }

    #[test]
    fn test_result_defaults() {
        let res: InvocationResult = serde_json::from_str(r#"{"leftOverGas":"0x10"}"#).unwrap();
        assert!(res.is_success());
        assert_eq!(res.left_over_gas, 16);
        assert!(res.return_data.is_empty());
        assert!(!InvocationResult::reverted(vec![], 0).is_success());
    }
}
