//! Invocation entry point.

use libevm_interop::params::EvmParams;
use libevm_interop::{EvmContext, Handle, Invocation, InvocationResult};

use crate::error::GatewayError;
use crate::gateway::LibEvm;

/// Runs invocations against a state view.
#[derive(Debug, Clone, Copy)]
pub struct Evm {
    libevm: &'static LibEvm,
}

impl Evm {
    pub fn new(libevm: &'static LibEvm) -> Self {
        Self { libevm }
    }

    /// Execute `invocation` on the state view `state`.
    ///
    /// Takes a raw handle so that callbacks running inside an outer apply can
    /// issue nested invocations on the view they were given. Execution
    /// failures (revert, out of gas) are part of the result; the error path
    /// is reserved for gateway failures such as an invalid handle.
    pub fn apply(
        &self,
        state: Handle,
        invocation: &Invocation,
        context: &EvmContext,
    ) -> Result<InvocationResult, GatewayError> {
        let params = EvmParams {
            handle: state,
            invocation: invocation.clone(),
            context: context.clone(),
        };
        self.libevm.call_with("EvmApply", &params)
    }
}
