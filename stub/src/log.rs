//! Native log records forwarded to the host log callback.
//!
//! Records are JSON objects `{"lvl", "msg", <key>: <value>...}` with the
//! short level names `trce`, `dbug`, `info`, `warn`, `eror`, `crit`.
//! Nothing is sent until `SetupLogging` names a handle.

use libevm_interop::Handle;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::host_bridge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Crit,
}

impl Level {
    pub fn short_name(&self) -> &'static str {
        match self {
            Level::Trace => "trce",
            Level::Debug => "dbug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "eror",
            Level::Crit => "crit",
        }
    }

    pub fn parse(name: &str) -> Option<Level> {
        match name.to_ascii_lowercase().as_str() {
            "trace" | "trce" => Some(Level::Trace),
            "debug" | "dbug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" | "eror" => Some(Level::Error),
            "crit" => Some(Level::Crit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sink {
    handle: Handle,
    level: Level,
}

static SINK: RwLock<Option<Sink>> = parking_lot::const_rwlock(None);

/// Route records at `level` and above to callback `handle`. An unknown
/// level name falls back to `info`.
pub fn setup(handle: Handle, level: &str) {
    let level = Level::parse(level).unwrap_or(Level::Info);
    *SINK.write() = Some(Sink { handle, level });
    log(Level::Debug, "logging configured", &[("level", Value::from(level.short_name()))]);
}

pub fn enabled(level: Level) -> bool {
    SINK.read().is_some_and(|sink| level >= sink.level)
}

/// Build the wire record.
pub fn record(level: Level, msg: &str, fields: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    map.insert("lvl".into(), Value::from(level.short_name()));
    map.insert("msg".into(), Value::from(msg));
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    Value::Object(map)
}

/// Forward a record. Delivery failures are dropped.
pub fn log(level: Level, msg: &str, fields: &[(&str, Value)]) {
    let Some(sink) = *SINK.read() else {
        return;
    };
    if level < sink.level || !host_bridge::has_proxy() {
        return;
    }
    let _ = host_bridge::invoke(sink.handle, &record(level, msg, fields).to_string(), false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(Level::parse("eror"), Some(Level::Error));
        assert_eq!(Level::parse("ERROR"), Some(Level::Error));
        assert_eq!(Level::parse("verbose"), None);
        assert_eq!(Level::Trace.short_name(), "trce");
        assert!(Level::Crit > Level::Warn);
    }

    #[test]
    fn test_record_shape() {
        let rec = record(Level::Warn, "slow", &[("handle", Value::from(3))]);
        assert_eq!(rec["lvl"], "warn");
        assert_eq!(rec["msg"], "slow");
        assert_eq!(rec["handle"], 3);
    }
}
