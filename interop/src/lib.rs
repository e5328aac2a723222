//! `libevm-interop`: boundary types shared by the libevm host gateway and
//! native modules.
//!
//! - **ABI:** the five C entry points and the callback proxy signature ([`abi`])
//! - **Envelope:** the `{error, result}` response of every call ([`envelope`])
//! - **Payloads:** method parameters, invocations, contexts and results
//! - **Codec:** JSON with `0x`-hex binary and quantity encoding ([`codec`])
//!
//! Nothing in this crate performs a boundary call; it only fixes what crosses it.

pub mod abi;
pub mod codec;
pub mod context;
pub mod envelope;
pub mod error;
pub mod invocation;
pub mod params;
pub mod results;
pub mod types;

pub use abi::NativeApi;
pub use context::{EvmContext, ForkRules, TraceOptions, TracerOpCode};
pub use envelope::{decode_envelope, Envelope};
pub use error::CodecError;
pub use invocation::{ExternalInvocation, Invocation, InvocationResult};
pub use results::{LogRecord, ProofAccountResult, ProofNode, StorageProof, TracerResult};
pub use types::{Address, Handle, Hash, LOG_CALLBACK_HANDLE};
