//! `libevm-stub`: a deterministic native module exporting the libevm C ABI.
//!
//! Built as a `cdylib` it can be loaded like any libevm build; linked as an
//! `rlib` its function table is available directly through [`native_api`].
//!
//! - **Exports:** `Invoke`, `CreateBuffer`, `FreeBuffer`, `SetCallbackProxy`, `SetupLogging`
//! - **State:** in-memory and on-disk stores, state views with snapshots and
//!   access lists, Merkle roots and proofs
//! - **Execution:** transfers, creation, external-call and block-hash callbacks
//! - **Tracing:** `callTracer` and a struct-logger summary
//! - **Ledger:** per-thread allocation counters in [`alloc`]

pub mod alloc;
pub mod database;
pub mod error;
pub mod evm;
pub mod exports;
pub mod handles;
pub mod host_bridge;
pub mod log;
pub mod merkle;
pub mod service;
pub mod state;
pub mod tracer;

use libevm_interop::NativeApi;

pub use error::{StubError, StubResult};

/// Function table of this module, for linking without `dlopen`.
pub fn native_api() -> NativeApi {
    NativeApi {
        invoke: exports::Invoke,
        create_buffer: exports::CreateBuffer,
        free_buffer: exports::FreeBuffer,
        set_callback_proxy: exports::SetCallbackProxy,
        setup_logging: exports::SetupLogging,
    }
}
