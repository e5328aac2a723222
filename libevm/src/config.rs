//! Gateway configuration.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

use crate::error::GatewayError;

/// Environment variable overriding [`LibEvmConfig::library_path`].
pub const ENV_LIBRARY_PATH: &str = "LIBEVM_LIBRARY_PATH";
/// Environment variable overriding [`LibEvmConfig::log_level`].
pub const ENV_LOG_LEVEL: &str = "LIBEVM_LOG_LEVEL";

/// Configuration for the process-wide gateway.
#[derive(Debug, Clone)]
pub struct LibEvmConfig {
    /// Shared library to load. Default: platform file name of `evm`
    /// (`libevm.so`, `libevm.dylib`, `evm.dll`), resolved by the loader.
    pub library_path: PathBuf,

    /// Most verbose level forwarded from the native module.
    /// Default: the currently active `tracing` max level.
    pub log_level: LevelFilter,
}

impl Default for LibEvmConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(libloading::library_filename("evm")),
            log_level: LevelFilter::current(),
        }
    }
}

impl LibEvmConfig {
    /// Defaults, overridden by `LIBEVM_LIBRARY_PATH` and `LIBEVM_LOG_LEVEL`.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let mut config = Self::default();
        if let Some(path) = lookup(ENV_LIBRARY_PATH).filter(|p| !p.is_empty()) {
            config.library_path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|l| !l.is_empty()) {
            config.log_level = LevelFilter::from_str(&level)
                .map_err(|_| GatewayError::Config(format!("{}={}", ENV_LOG_LEVEL, level)))?;
        }
        Ok(config)
    }

    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = path.into();
        self
    }

    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = LibEvmConfig::default();
        let name = config.library_path.to_string_lossy().to_string();
        assert!(name.contains("evm"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = [(ENV_LIBRARY_PATH, "/opt/libevm.so"), (ENV_LOG_LEVEL, "debug")];
        let config = LibEvmConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.library_path, PathBuf::from("/opt/libevm.so"));
        assert_eq!(config.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = LibEvmConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn test_empty_values_ignored() {
        let config = LibEvmConfig::from_lookup(lookup(&[(ENV_LIBRARY_PATH, "")])).unwrap();
        assert_eq!(config.library_path, LibEvmConfig::default().library_path);
    }
}
