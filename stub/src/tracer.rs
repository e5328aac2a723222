//! Recording tracers.
//!
//! `callTracer` builds the nested call-frame tree; the default struct logger
//! (empty name) keeps a summary of the top frame. Any other name is rejected.

use libevm_interop::{Address, TraceOptions, TracerOpCode};
use num_bigint::BigUint;
use serde_json::{json, Value};

use libevm_interop::codec::{encode_hex, encode_quantity};

use crate::error::{StubError, StubResult};

pub const CALL_TRACER: &str = "callTracer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerKind {
    StructLogger,
    Call,
}

#[derive(Debug, Clone, Default)]
struct CallFrame {
    kind: String,
    from: Address,
    to: Address,
    input: Vec<u8>,
    gas: u64,
    gas_used: u64,
    value: Option<BigUint>,
    output: Vec<u8>,
    error: String,
    calls: Vec<CallFrame>,
}

impl CallFrame {
    fn to_json(&self) -> Value {
        let mut frame = json!({
            "type": self.kind,
            "from": self.from,
            "to": self.to,
            "input": encode_hex(&self.input),
            "gas": format!("0x{:x}", self.gas),
            "gasUsed": format!("0x{:x}", self.gas_used),
        });
        if let Some(value) = &self.value {
            frame["value"] = Value::from(encode_quantity(value));
        }
        if !self.output.is_empty() {
            frame["output"] = Value::from(encode_hex(&self.output));
        }
        if !self.error.is_empty() {
            frame["error"] = Value::from(self.error.clone());
        }
        if !self.calls.is_empty() {
            frame["calls"] = Value::Array(self.calls.iter().map(CallFrame::to_json).collect());
        }
        frame
    }
}

/// Entry of a frame as reported by the executor.
#[derive(Debug, Clone)]
pub struct FrameStart {
    pub op_code: TracerOpCode,
    pub from: Address,
    pub to: Address,
    pub input: Vec<u8>,
    pub gas: u64,
    pub value: Option<BigUint>,
}

#[derive(Debug)]
pub struct Tracer {
    kind: TracerKind,
    options: TraceOptions,
    gas_limit: u64,
    rest_gas: Option<u64>,
    stack: Vec<CallFrame>,
    root: Option<CallFrame>,
    duration_ns: u64,
}

impl Tracer {
    pub fn new(options: TraceOptions) -> StubResult<Self> {
        let kind = match options.tracer.as_str() {
            "" => TracerKind::StructLogger,
            CALL_TRACER => TracerKind::Call,
            other => return Err(StubError::TracerNotFound(other.to_string())),
        };
        Ok(Self {
            kind,
            options,
            gas_limit: 0,
            rest_gas: None,
            stack: Vec::new(),
            root: None,
            duration_ns: 0,
        })
    }

    pub fn kind(&self) -> TracerKind {
        self.kind
    }

    pub fn capture_tx_start(&mut self, gas_limit: u64) {
        self.gas_limit = gas_limit;
        self.rest_gas = None;
    }

    pub fn capture_tx_end(&mut self, rest_gas: u64) {
        self.rest_gas = Some(rest_gas);
    }

    pub fn capture_start(&mut self, frame: FrameStart) {
        self.stack.clear();
        self.root = None;
        self.stack.push(open_frame(frame));
    }

    pub fn capture_end(&mut self, output: Vec<u8>, gas_used: u64, duration_ns: u64, err: String) {
        self.duration_ns = duration_ns;
        // Frames left open by a faulty executor are folded into the root.
        while self.stack.len() > 1 {
            self.close_top(Vec::new(), 0, String::new());
        }
        if let Some(mut root) = self.stack.pop() {
            root.output = output;
            root.gas_used = gas_used;
            root.error = err;
            self.root = Some(root);
        }
    }

    pub fn capture_enter(&mut self, frame: FrameStart) {
        self.stack.push(open_frame(frame));
    }

    pub fn capture_exit(&mut self, output: Vec<u8>, gas_used: u64, err: String) {
        if self.stack.len() > 1 {
            self.close_top(output, gas_used, err);
        }
    }

    fn close_top(&mut self, output: Vec<u8>, gas_used: u64, err: String) {
        if let Some(mut frame) = self.stack.pop() {
            frame.output = output;
            frame.gas_used = gas_used;
            frame.error = err;
            if let Some(parent) = self.stack.last_mut() {
                parent.calls.push(frame);
            }
        }
    }

    /// JSON result; `null` before the top frame has ended.
    pub fn result(&self) -> Value {
        let Some(root) = &self.root else {
            return Value::Null;
        };
        match self.kind {
            TracerKind::Call => root.to_json(),
            TracerKind::StructLogger => {
                let mut summary = json!({
                    "gas": root.gas_used,
                    "failed": !root.error.is_empty(),
                    "returnValue": hex_digits(&root.output),
                    "structLogs": [],
                });
                if self.options.enable_return_data {
                    summary["gasLimit"] = Value::from(self.gas_limit);
                }
                if let Some(rest) = self.rest_gas {
                    summary["restGas"] = Value::from(rest);
                }
                summary
            }
        }
    }

    pub fn duration_ns(&self) -> u64 {
        self.duration_ns
    }
}

fn open_frame(frame: FrameStart) -> CallFrame {
    CallFrame {
        kind: frame.op_code.name().to_string(),
        from: frame.from,
        to: frame.to,
        input: frame.input,
        gas: frame.gas,
        value: frame.value,
        ..Default::default()
    }
}

fn hex_digits(bytes: &[u8]) -> String {
    encode_hex(bytes).trim_start_matches("0x").to_string()
}
