//! `libevm`: host gateway to a libevm native module.
//!
//! The native module lives behind a C boundary that carries only strings,
//! buffers and integers. This crate provides:
//!
//! - **Gateway:** named synchronous calls with JSON payloads and a uniform
//!   `{error, result}` envelope ([`LibEvm`])
//! - **Buffer ownership:** every buffer crossing the boundary is released
//!   exactly once by its owner ([`buffer`])
//! - **Callbacks:** host callbacks named by small integer handles, reached by
//!   the module through one entry point ([`CallbackRegistry`], [`CallbackHandle`])
//! - **Resource handles:** persistent stores, state views and tracers with a
//!   one-way `Open -> Closed` lifecycle ([`Database`], [`StateDb`], [`Tracer`])
//!
//! The primary entry point is [`LibEvm::load`].

pub mod buffer;
pub mod callback;
pub mod callbacks;
pub mod config;
pub mod database;
pub mod error;
pub mod evm;
pub mod gateway;
pub mod library;
pub mod logging;
pub mod registry;
pub mod resource;
pub mod state;
pub mod tracer;

pub use callback::{CallbackHandle, LibEvmCallback};
pub use callbacks::{BlockHashCallback, BlockHashProvider, ExternalCallHandler, InvocationCallback};
pub use config::LibEvmConfig;
pub use database::Database;
pub use error::GatewayError;
pub use evm::Evm;
pub use gateway::LibEvm;
pub use registry::{registry, CallbackRegistry};
pub use resource::{ResourceHandle, ResourceState};
pub use state::StateDb;
pub use tracer::{Frame, FrameResult, Tracer};

pub use libevm_interop as interop;
