//! Shared helpers for gateway integration tests.
//!
//! The gateway is bound once per test binary to the statically linked stub
//! module; tests run in parallel, so they never assume specific native
//! handle values.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use libevm::interop::{Address, Hash};
use libevm::{LibEvm, LibEvmConfig};
use tracing::level_filters::LevelFilter;

/// The process-wide gateway bound to the stub module.
pub fn libevm() -> &'static LibEvm {
    let config = LibEvmConfig::default().with_log_level(LevelFilter::TRACE);
    LibEvm::init(libevm_stub::native_api(), &config).expect("gateway init")
}

pub fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

pub fn hash(byte: u8) -> Hash {
    Hash([byte; 32])
}

/// Hash with `value` in the last byte, like a small storage key.
pub fn slot(value: u8) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[31] = value;
    Hash(bytes)
}

/// In-memory writer for asserting on formatted `tracing` output.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber capturing all events.
pub fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, logs.contents())
}
