//! Persistent store handle.

use std::path::Path;

use libevm_interop::params::{DatabaseParams, LevelDbParams};
use libevm_interop::Handle;

use crate::error::{wire_path, GatewayError};
use crate::gateway::LibEvm;
use crate::resource::{ResourceHandle, ResourceKind};

#[derive(Debug)]
pub struct DatabaseKind;

impl ResourceKind for DatabaseKind {
    const NAME: &'static str = "database";

    fn release(libevm: &LibEvm, handle: Handle) -> Result<(), GatewayError> {
        libevm.execute_with("DatabaseClose", &DatabaseParams { database_handle: handle })
    }
}

/// A native persistent store backing state views.
#[derive(Debug)]
pub struct Database {
    resource: ResourceHandle<DatabaseKind>,
}

impl Database {
    /// Open a volatile in-memory store.
    pub fn open_memory(libevm: &'static LibEvm) -> Result<Self, GatewayError> {
        let handle: Handle = libevm.call("DatabaseOpenMemoryDB")?;
        Ok(Self::from_handle(libevm, handle))
    }

    /// Open (or create) an on-disk store at `path`.
    ///
    /// With `preimages`, the store records key preimages so dumps show
    /// plain addresses.
    /// A path that is not valid UTF-8 is refused before the call.
    pub fn open_leveldb(
        libevm: &'static LibEvm,
        path: &Path,
        preimages: bool,
    ) -> Result<Self, GatewayError> {
        let params = LevelDbParams {
            path: wire_path(path)?.to_string(),
            preimages,
        };
        let handle: Handle = libevm.call_with("DatabaseOpenLevelDB", &params)?;
        Ok(Self::from_handle(libevm, handle))
    }

    fn from_handle(libevm: &'static LibEvm, handle: Handle) -> Self {
        Self {
            resource: ResourceHandle::opened(libevm, handle),
        }
    }

    pub fn handle(&self) -> Handle {
        self.resource.handle()
    }

    pub(crate) fn libevm(&self) -> &'static LibEvm {
        self.resource.libevm()
    }

    pub fn close(self) -> Result<(), GatewayError> {
        self.resource.close()
    }
}
