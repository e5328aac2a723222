//! Shared-library loading and ABI symbol validation.
//!
//! A native module is accepted only if it exports every symbol in
//! [`REQUIRED_SYMBOLS`]; all missing names are reported at once.

use std::path::{Path, PathBuf};

use libevm_interop::abi::{
    CreateBufferFn, FreeBufferFn, InvokeFn, NativeApi, SetCallbackProxyFn, SetupLoggingFn,
    REQUIRED_SYMBOLS, SYMBOL_CREATE_BUFFER, SYMBOL_FREE_BUFFER, SYMBOL_INVOKE, SYMBOL_SETUP_LOGGING,
    SYMBOL_SET_CALLBACK_PROXY,
};
use libloading::Library;
use tracing::info;

use crate::error::GatewayError;

/// A loaded native module. The library stays mapped while this value lives;
/// the function table must not be used after it is dropped.
pub struct NativeLibrary {
    library: Library,
    api: NativeApi,
    path: PathBuf,
}

impl NativeLibrary {
    /// Open the shared library at `path` and resolve its function table.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        // SAFETY: loading runs the library's initializers; a libevm module has
        // no initializers with preconditions on the host.
        let library = unsafe { Library::new(path) }?;
        validate_symbols(&library)?;

        // SAFETY: the symbol types are the documented C signatures of the ABI.
        let api = unsafe {
            NativeApi {
                invoke: *library.get::<InvokeFn>(SYMBOL_INVOKE.as_bytes())?,
                create_buffer: *library.get::<CreateBufferFn>(SYMBOL_CREATE_BUFFER.as_bytes())?,
                free_buffer: *library.get::<FreeBufferFn>(SYMBOL_FREE_BUFFER.as_bytes())?,
                set_callback_proxy: *library
                    .get::<SetCallbackProxyFn>(SYMBOL_SET_CALLBACK_PROXY.as_bytes())?,
                setup_logging: *library.get::<SetupLoggingFn>(SYMBOL_SETUP_LOGGING.as_bytes())?,
            }
        };

        info!(path = %path.display(), "loaded native module");
        Ok(Self {
            library,
            api,
            path: path.to_path_buf(),
        })
    }

    pub fn api(&self) -> NativeApi {
        self.api
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("library", &self.library)
            .finish()
    }
}

/// Check that every required symbol is exported.
fn validate_symbols(library: &Library) -> Result<(), GatewayError> {
    let missing: Vec<String> = REQUIRED_SYMBOLS
        .iter()
        // SAFETY: the symbol is looked up only, never called through this type.
        .filter(|name| unsafe { library.get::<*const ()>(name.as_bytes()) }.is_err())
        .map(|name| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GatewayError::MissingSymbols(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let err = NativeLibrary::load(Path::new("/nonexistent/libevm-missing.so")).unwrap_err();
        assert!(matches!(err, GatewayError::Library(_)));
        assert!(err.is_fatal());
    }
}
