//! Tracer handle.
//!
//! A tracer is attached to an apply through [`EvmContext::with_tracer`], or
//! driven by hand with the `capture_*` calls when the host runs frames itself
//! (for example around external contract invocations).

use std::time::Duration;

use libevm_interop::params::{
    TracerEndParams, TracerEnterParams, TracerExitParams, TracerParams, TracerStartParams,
    TracerTxEndParams, TracerTxStartParams,
};
use libevm_interop::{Address, EvmContext, Handle, TraceOptions, TracerOpCode, TracerResult};
use num_bigint::BigUint;

use crate::error::GatewayError;
use crate::gateway::LibEvm;
use crate::resource::{ResourceHandle, ResourceKind};
use crate::state::StateDb;

#[derive(Debug)]
pub struct TracerKind;

impl ResourceKind for TracerKind {
    const NAME: &'static str = "tracer";

    fn release(libevm: &LibEvm, handle: Handle) -> Result<(), GatewayError> {
        libevm.execute_with("TracerRemove", &TracerParams { tracer_handle: handle })
    }
}

/// A call frame as reported to the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub from: Address,
    pub to: Address,
    pub input: Vec<u8>,
    pub gas: u64,
    pub value: Option<BigUint>,
}

/// Outcome of a call frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameResult {
    pub output: Vec<u8>,
    pub gas_used: u64,
    /// Empty on success.
    pub err: String,
}

#[derive(Debug)]
pub struct Tracer {
    resource: ResourceHandle<TracerKind>,
}

impl Tracer {
    pub fn create(libevm: &'static LibEvm, options: &TraceOptions) -> Result<Self, GatewayError> {
        let handle: Handle = libevm.call_with("TracerCreate", options)?;
        Ok(Self {
            resource: ResourceHandle::opened(libevm, handle),
        })
    }

    pub fn handle(&self) -> Handle {
        self.resource.handle()
    }

    pub fn close(self) -> Result<(), GatewayError> {
        self.resource.close()
    }

    fn libevm(&self) -> &'static LibEvm {
        self.resource.libevm()
    }

    fn params(&self) -> TracerParams {
        TracerParams {
            tracer_handle: self.handle(),
        }
    }

    /// The trace collected so far.
    pub fn result(&self) -> Result<serde_json::Value, GatewayError> {
        let result: TracerResult = self.libevm().call_with("TracerResult", &self.params())?;
        Ok(result.result)
    }

    // ── Transaction level ──

    pub fn capture_tx_start(&self, gas_limit: u64) -> Result<(), GatewayError> {
        let params = TracerTxStartParams {
            tracer_handle: self.handle(),
            gas_limit,
        };
        self.libevm().execute_with("TracerCaptureTxStart", &params)
    }

    pub fn capture_tx_end(&self, rest_gas: u64) -> Result<(), GatewayError> {
        let params = TracerTxEndParams {
            tracer_handle: self.handle(),
            rest_gas,
        };
        self.libevm().execute_with("TracerCaptureTxEnd", &params)
    }

    // ── Top call frame ──

    pub fn capture_start(
        &self,
        state: &StateDb,
        context: &EvmContext,
        frame: &Frame,
        create: bool,
    ) -> Result<(), GatewayError> {
        let params = TracerStartParams {
            tracer_handle: self.handle(),
            state_db: state.handle(),
            context: context.clone(),
            from: frame.from,
            to: frame.to,
            create,
            input: frame.input.clone(),
            gas: frame.gas,
            value: frame.value.clone(),
        };
        self.libevm().execute_with("TracerCaptureStart", &params)
    }

    pub fn capture_end(
        &self,
        result: &FrameResult,
        duration: Duration,
    ) -> Result<(), GatewayError> {
        let params = TracerEndParams {
            tracer_handle: self.handle(),
            output: result.output.clone(),
            gas_used: result.gas_used,
            duration: u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
            err: result.err.clone(),
        };
        self.libevm().execute_with("TracerCaptureEnd", &params)
    }

    // ── Nested call frames ──

    pub fn capture_enter(&self, op_code: TracerOpCode, frame: &Frame) -> Result<(), GatewayError> {
        let params = TracerEnterParams {
            tracer_handle: self.handle(),
            op_code,
            from: frame.from,
            to: frame.to,
            input: frame.input.clone(),
            gas: frame.gas,
            value: frame.value.clone(),
        };
        self.libevm().execute_with("TracerCaptureEnter", &params)
    }

    pub fn capture_exit(&self, result: &FrameResult) -> Result<(), GatewayError> {
        let params = TracerExitParams {
            tracer_handle: self.handle(),
            output: result.output.clone(),
            gas_used: result.gas_used,
            err: result.err.clone(),
        };
        self.libevm().execute_with("TracerCaptureExit", &params)
    }
}
