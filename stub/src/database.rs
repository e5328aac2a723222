//! Persistent store behind a database handle.
//!
//! Both kinds keep committed states in memory, keyed by root. The on-disk
//! kind also writes every committed state to `<path>/<root>.json` and reads
//! all of them back when reopened at the same path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use libevm_interop::Hash;
use parking_lot::RwLock;

use crate::error::{StubError, StubResult};
use crate::state::Accounts;

const STATE_FILE_EXTENSION: &str = "json";

#[derive(Debug)]
pub struct Database {
    roots: RwLock<HashMap<Hash, Accounts>>,
    path: Option<PathBuf>,
    preimages: bool,
}

impl Database {
    /// In-memory store. Preimages are always recorded.
    pub fn memory() -> Self {
        Self {
            roots: RwLock::new(HashMap::new()),
            path: None,
            preimages: true,
        }
    }

    /// On-disk store at `path`, created if missing.
    pub fn open(path: &Path, preimages: bool) -> StubResult<Self> {
        fs::create_dir_all(path)?;
        let mut roots = HashMap::new();
        for entry in fs::read_dir(path)? {
            let file = entry?.path();
            if file.extension().and_then(|e| e.to_str()) != Some(STATE_FILE_EXTENSION) {
                continue;
            }
            let Some(root) = file
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<Hash>().ok())
            else {
                continue;
            };
            let accounts: Accounts = serde_json::from_slice(&fs::read(&file)?)?;
            roots.insert(root, accounts);
        }
        Ok(Self {
            roots: RwLock::new(roots),
            path: Some(path.to_path_buf()),
            preimages,
        })
    }

    pub fn preimages(&self) -> bool {
        self.preimages
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Committed state at `root`.
    pub fn load(&self, root: &Hash) -> StubResult<Accounts> {
        self.roots
            .read()
            .get(root)
            .cloned()
            .ok_or_else(|| StubError::MissingRoot(root.to_string()))
    }

    pub fn store(&self, root: Hash, accounts: Accounts) -> StubResult<()> {
        if let Some(path) = &self.path {
            let file = path.join(format!("{}.{}", root, STATE_FILE_EXTENSION));
            fs::write(file, serde_json::to_vec(&accounts)?)?;
        }
        self.roots.write().insert(root, accounts);
        Ok(())
    }

    pub fn root_count(&self) -> usize {
        self.roots.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Account;
    use libevm_interop::Address;

    fn accounts() -> Accounts {
        let mut accounts = Accounts::new();
        accounts.insert(
            Address([1; 20]),
            Account {
                nonce: 3,
                ..Default::default()
            },
        );
        accounts
    }

    #[test]
    fn test_memory_missing_root() {
        let db = Database::memory();
        assert!(matches!(db.load(&Hash([1; 32])), Err(StubError::MissingRoot(_))));
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = Hash([9; 32]);
        {
            let db = Database::open(dir.path(), false).unwrap();
            db.store(root, accounts()).unwrap();
        }
        let db = Database::open(dir.path(), false).unwrap();
        assert_eq!(db.root_count(), 1);
        assert_eq!(db.load(&root).unwrap(), accounts());
        assert!(!db.preimages());
    }

    #[test]
    fn test_foreign_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("LOCK"), b"").unwrap();
        fs::write(dir.path().join("notahash.json"), b"{}").unwrap();
        let db = Database::open(dir.path(), true).unwrap();
        assert_eq!(db.root_count(), 0);
    }
}
