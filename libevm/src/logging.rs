//! Native log forwarding.
//!
//! The native module writes one JSON record per log line to the callback
//! registered at [`LOG_CALLBACK_HANDLE`](libevm_interop::LOG_CALLBACK_HANDLE).
//! Records are re-emitted as `tracing` events under the `libevm::native`
//! target, with the record's extra keys rendered into a `fields` value.

use libevm_interop::{codec, LogRecord};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, trace, warn, Level};

use crate::callback::LibEvmCallback;

/// Callback receiving native log records. Never returns a result.
#[derive(Debug, Default)]
pub struct LogCallback;

impl LibEvmCallback for LogCallback {
    fn invoke(&self, args: &str) -> Option<String> {
        match codec::from_json::<LogRecord>(args) {
            Ok(record) => emit(&record),
            Err(e) => warn!(error = %e, raw = args, "unparseable native log record"),
        }
        None
    }
}

/// Map a native level name to a `tracing` level. Unknown names log at info.
pub fn parse_native_level(lvl: &str) -> Level {
    match lvl {
        "trce" | "trace" => Level::TRACE,
        "dbug" | "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "eror" | "error" | "crit" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Level name passed to `SetupLogging` for a `tracing` filter.
pub fn native_level(filter: LevelFilter) -> &'static str {
    match filter.into_level() {
        Some(Level::TRACE) => "trace",
        Some(Level::DEBUG) => "debug",
        Some(Level::INFO) => "info",
        Some(Level::WARN) => "warn",
        Some(Level::ERROR) => "error",
        // everything off: only critical records pass
        None => "crit",
    }
}

fn emit(record: &LogRecord) {
    let fields = serde_json::Value::Object(record.fields.clone());
    let msg = record.msg.as_str();
    match parse_native_level(&record.lvl) {
        Level::TRACE => trace!(target: "libevm::native", %fields, "{}", msg),
        Level::DEBUG => debug!(target: "libevm::native", %fields, "{}", msg),
        Level::INFO => info!(target: "libevm::native", %fields, "{}", msg),
        Level::WARN => warn!(target: "libevm::native", %fields, "{}", msg),
        _ => error!(target: "libevm::native", %fields, "{}", msg),
    }
}
