//! Minimal deterministic executor behind `EvmApply`.
//!
//! - value transfers between accounts, with revert on failure
//! - contract creation: the init code is stored as the contract code
//! - calls to external contracts are delegated to the host callback
//! - the block-hash selector answers through the block-hash callback
//!
//! Locks on the state view and the tracer are never held while a host
//! callback runs; callbacks may re-enter the module on the same handles.

use std::time::Instant;

use libevm_interop::{
    Address, EvmContext, ExternalInvocation, Handle, Hash, Invocation, InvocationResult,
    TracerOpCode,
};
use num_bigint::BigUint;
use parking_lot::Mutex;

use crate::error::{StubError, StubResult};
use crate::host_bridge;
use crate::log::{self, Level};
use crate::merkle::hash_bytes;
use crate::state::StateDb;
use crate::tracer::{FrameStart, Tracer};

/// Gas charged for every top-level invocation.
pub const INTRINSIC_GAS: u64 = 21_000;

/// Gas charged on top of the intrinsic cost for a contract creation.
pub const CREATE_GAS: u64 = 32_000;

/// Selector of `blockHash(uint256)`: returns the hash of the previous block.
pub const BLOCK_HASH_SELECTOR: [u8; 4] = [0x96, 0x63, 0xf8, 0x8f];

const MAX_GAS: u64 = i64::MAX as u64;

/// Defaults for omitted context fields.
pub fn with_defaults(mut context: EvmContext) -> EvmContext {
    if context.gas_limit == 0 {
        context.gas_limit = MAX_GAS;
    }
    context.gas_price.get_or_insert_with(BigUint::default);
    context.block_number.get_or_insert_with(BigUint::default);
    context.base_fee.get_or_insert_with(|| BigUint::from(1_000_000_000u64));
    if context.time.is_none() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        context.time = Some(BigUint::from(now));
    }
    context
}

/// Address of a contract created by `caller` at `nonce`.
pub fn create_address(caller: &Address, nonce: u64) -> Address {
    let mut data = Vec::with_capacity(28);
    data.extend_from_slice(caller.as_ref());
    data.extend_from_slice(&nonce.to_be_bytes());
    let hash = hash_bytes(&data);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash.0[12..]);
    Address(address)
}

/// Hash answered for `number` when no block-hash callback is configured.
pub fn mock_block_hash(number: &BigUint) -> Hash {
    hash_bytes(number.to_string().as_bytes())
}

pub struct Executor<'a> {
    state: &'a Mutex<StateDb>,
    tracer: Option<&'a Mutex<Tracer>>,
    context: EvmContext,
}

impl<'a> Executor<'a> {
    pub fn new(
        state: &'a Mutex<StateDb>,
        tracer: Option<&'a Mutex<Tracer>>,
        context: EvmContext,
    ) -> Self {
        Self {
            state,
            tracer,
            context: with_defaults(context),
        }
    }

    pub fn apply(&self, mut invocation: Invocation) -> StubResult<InvocationResult> {
        if invocation.gas == 0 {
            invocation.gas = MAX_GAS;
        }
        let started = Instant::now();
        let to = invocation.callee.unwrap_or(Address::ZERO);
        self.trace(|t| {
            t.capture_tx_start(invocation.gas);
            t.capture_start(frame_start(&invocation, to));
        });

        let result = self.run(&invocation)?;

        let gas_used = invocation.gas.saturating_sub(result.left_over_gas);
        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.trace(|t| {
            t.capture_end(
                result.return_data.clone(),
                gas_used,
                elapsed,
                result.execution_error.clone(),
            );
            t.capture_tx_end(result.left_over_gas);
        });
        log::log(
            Level::Debug,
            "applied invocation",
            &[
                ("caller", invocation.caller.to_string().into()),
                ("gasUsed", gas_used.into()),
                ("error", result.execution_error.clone().into()),
            ],
        );
        Ok(result)
    }

    fn run(&self, invocation: &Invocation) -> StubResult<InvocationResult> {
        let mut cost = INTRINSIC_GAS;
        if invocation.is_create() {
            cost += CREATE_GAS;
        }
        if invocation.gas < cost {
            return Ok(InvocationResult::failure("out of gas"));
        }
        let remaining = invocation.gas - cost;
        let value = invocation.value.clone().unwrap_or_default();
        if invocation.read_only && value > BigUint::default() {
            return Ok(InvocationResult::failure("write protection"));
        }

        let snapshot = self.state.lock().snapshot();
        let result = match invocation.callee {
            None => self.create(invocation, &value, remaining),
            Some(callee) => self.call(invocation, callee, &value, remaining),
        };
        match result {
            Ok(result) if result.is_success() => Ok(result),
            Ok(result) => {
                self.state.lock().revert_to_snapshot(snapshot)?;
                Ok(result)
            }
            Err(err) => {
                self.state.lock().revert_to_snapshot(snapshot)?;
                Err(err)
            }
        }
    }

    fn create(
        &self,
        invocation: &Invocation,
        value: &BigUint,
        remaining: u64,
    ) -> StubResult<InvocationResult> {
        let mut state = self.state.lock();
        let nonce = state.nonce(&invocation.caller);
        let address = create_address(&invocation.caller, nonce);
        if !state.code(&address).is_empty() || state.nonce(&address) != 0 {
            return Ok(InvocationResult::failure("contract address collision"));
        }
        state.set_nonce(invocation.caller, nonce + 1);
        if let Err(err) = transfer(&mut state, invocation.caller, address, value) {
            return Ok(InvocationResult::failure(err));
        }
        state.set_nonce(address, 1);
        state.set_code(address, invocation.input.clone());
        Ok(InvocationResult {
            contract_address: Some(address),
            ..InvocationResult::success(Vec::new(), remaining)
        })
    }

    fn call(
        &self,
        invocation: &Invocation,
        callee: Address,
        value: &BigUint,
        remaining: u64,
    ) -> StubResult<InvocationResult> {
        {
            let mut state = self.state.lock();
            let nonce = state.nonce(&invocation.caller);
            state.set_nonce(invocation.caller, nonce + 1);
            if let Err(err) = transfer(&mut state, invocation.caller, callee, value) {
                return Ok(InvocationResult::failure(err));
            }
        }

        if self.context.external_contracts.contains(&callee) {
            return self.call_external(invocation, callee, remaining);
        }
        if invocation.input.starts_with(&BLOCK_HASH_SELECTOR) {
            let number = self.context.block_number.clone().unwrap_or_default();
            let previous = if number > BigUint::default() { number - 1u32 } else { number };
            let hash = self.block_hash(&previous);
            return Ok(InvocationResult::success(hash.0.to_vec(), remaining));
        }
        Ok(InvocationResult::success(Vec::new(), remaining))
    }

    fn call_external(
        &self,
        invocation: &Invocation,
        callee: Address,
        remaining: u64,
    ) -> StubResult<InvocationResult> {
        let Some(handle) = self.context.external_callback else {
            return Ok(InvocationResult::success(Vec::new(), remaining));
        };
        let external = ExternalInvocation {
            caller: invocation.caller,
            callee: Some(callee),
            value: invocation.value.clone(),
            input: invocation.input.clone(),
            gas: remaining,
            read_only: invocation.read_only,
            depth: self.context.initial_depth + 1,
        };
        let op_code = if invocation.read_only {
            TracerOpCode::StaticCall
        } else {
            TracerOpCode::Call
        };
        self.trace(|t| {
            t.capture_enter(FrameStart {
                op_code,
                from: external.caller,
                to: callee,
                input: external.input.clone(),
                gas: external.gas,
                value: external.value.clone(),
            })
        });

        let outcome = invoke_external(handle, &external);
        let result = match outcome {
            Ok(result) if result.reverted => {
                InvocationResult::reverted(result.return_data, result.left_over_gas)
            }
            Ok(result) if !result.execution_error.is_empty() => InvocationResult::failure(format!(
                "external contract invocation failed: {}",
                result.execution_error
            )),
            Ok(result) => {
                InvocationResult::success(result.return_data, result.left_over_gas.min(remaining))
            }
            Err(err) => {
                InvocationResult::failure(format!("external contract invocation failed: {}", err))
            }
        };

        let gas_used = remaining.saturating_sub(result.left_over_gas);
        self.trace(|t| {
            t.capture_exit(result.return_data.clone(), gas_used, result.execution_error.clone())
        });
        Ok(result)
    }

    fn block_hash(&self, number: &BigUint) -> Hash {
        let Some(handle) = self.context.block_hash_callback else {
            return mock_block_hash(number);
        };
        match invoke_block_hash(handle, number) {
            Ok(hash) => hash,
            Err(err) => {
                log::log(
                    Level::Warn,
                    "block hash lookup failed",
                    &[("err", err.to_string().into())],
                );
                Hash::ZERO
            }
        }
    }

    fn trace(&self, f: impl FnOnce(&mut Tracer)) {
        if let Some(tracer) = self.tracer {
            f(&mut tracer.lock());
        }
    }
}

fn frame_start(invocation: &Invocation, to: Address) -> FrameStart {
    FrameStart {
        op_code: if invocation.is_create() { TracerOpCode::Create } else { TracerOpCode::Call },
        from: invocation.caller,
        to,
        input: invocation.input.clone(),
        gas: invocation.gas,
        value: invocation.value.clone(),
    }
}

fn transfer(
    state: &mut StateDb,
    from: Address,
    to: Address,
    value: &BigUint,
) -> Result<(), String> {
    if *value == BigUint::default() {
        return Ok(());
    }
    if state.balance(&from) < *value {
        return Err("insufficient balance for transfer".to_string());
    }
    state.sub_balance(from, value).map_err(|e| e.to_string())?;
    state.add_balance(to, value);
    Ok(())
}

fn invoke_external(
    handle: Handle,
    invocation: &ExternalInvocation,
) -> StubResult<InvocationResult> {
    let args = serde_json::to_string(invocation)?;
    let output = host_bridge::invoke(handle, &args, true)?
        .ok_or_else(|| StubError::Callback("empty result".into()))?;
    Ok(serde_json::from_str(&output)?)
}

fn invoke_block_hash(handle: Handle, number: &BigUint) -> StubResult<Hash> {
    let args = serde_json::to_string(&libevm_interop::codec::encode_quantity(number))?;
    let output = host_bridge::invoke(handle, &args, true)?
        .ok_or_else(|| StubError::Callback("empty result".into()))?;
    Ok(serde_json::from_str(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use std::sync::Arc;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn state() -> Mutex<StateDb> {
        Mutex::new(StateDb::open(Arc::new(Database::memory()), Hash::ZERO).unwrap())
    }

    #[test]
    fn test_defaults_applied() {
        let context = with_defaults(EvmContext::new(1));
        assert_eq!(context.gas_limit, i64::MAX as u64);
        assert_eq!(context.gas_price, Some(BigUint::default()));
        assert!(context.time.is_some());
    }

    #[test]
    fn test_transfer() {
        let state = state();
        state.lock().add_balance(addr(1), &BigUint::from(100u32));
        let executor = Executor::new(&state, None, EvmContext::new(1));
        let result = executor
            .apply(Invocation::call(addr(1), addr(2), vec![], 100_000).with_value(40u32))
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.left_over_gas, 100_000 - INTRINSIC_GAS);
        assert_eq!(state.lock().balance(&addr(2)), BigUint::from(40u32));
        assert_eq!(state.lock().nonce(&addr(1)), 1);
    }

    #[test]
    fn test_insufficient_balance_reverts() {
        let state = state();
        let executor = Executor::new(&state, None, EvmContext::new(1));
        let result = executor
            .apply(Invocation::call(addr(1), addr(2), vec![], 100_000).with_value(1u32))
            .unwrap();
        assert_eq!(result.execution_error, "insufficient balance for transfer");
        assert_eq!(state.lock().nonce(&addr(1)), 0);
    }

    #[test]
    fn test_create_sets_code() {
        let state = state();
        let executor = Executor::new(&state, None, EvmContext::new(1));
        let result = executor.apply(Invocation::create(addr(1), vec![0x60, 0x01], 0)).unwrap();
        let address = result.contract_address.unwrap();
        assert_eq!(address, create_address(&addr(1), 0));
        assert!(result.return_data.is_empty());
        assert_eq!(state.lock().code(&address), vec![0x60, 0x01]);
        assert_eq!(state.lock().nonce(&addr(1)), 1);
    }

    #[test]
    fn test_out_of_gas() {
        let state = state();
        let executor = Executor::new(&state, None, EvmContext::new(1));
        let result = executor.apply(Invocation::call(addr(1), addr(2), vec![], 100)).unwrap();
        assert_eq!(result.execution_error, "out of gas");
    }

    #[test]
    fn test_mock_block_hash() {
        let state = state();
        let executor = Executor::new(&state, None, EvmContext::new(1).with_block_number(10u32));
        let result = executor
            .apply(Invocation::call(addr(1), addr(2), BLOCK_HASH_SELECTOR.to_vec(), 100_000))
            .unwrap();
        assert_eq!(result.return_data, mock_block_hash(&BigUint::from(9u32)).0.to_vec());
    }

    #[test]
    fn test_traced_apply() {
        let state = state();
        let options = libevm_interop::TraceOptions::named("callTracer");
        let tracer = Mutex::new(Tracer::new(options).unwrap());
        let executor = Executor::new(&state, Some(&tracer), EvmContext::new(1));
        executor.apply(Invocation::call(addr(1), addr(2), vec![], 50_000)).unwrap();
        assert_eq!(tracer.lock().result()["gasUsed"], format!("0x{:x}", INTRINSIC_GAS));
    }
}
