//! Persistent storage root (§4.3, §4.5): wraps the KV database and the
//! block/undo file writer behind one handle. `corebit-store` owns the
//! on-disk formats; this module just owns the lifecycle of opening them
//! once per chain directory and sharing that handle with the UTXO cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use corebit_store::{BlockFileWriter, Store};

pub const BLOCK_STORE_DIR_NAME: &str = "blocks";

pub fn block_store_path(chain_dir: &Path) -> PathBuf {
    chain_dir.join(BLOCK_STORE_DIR_NAME)
}

/// Owns the redb handle and the block-file writer for one chain directory.
/// The `Store` is `Arc`-wrapped so [`crate::utxo_cache::UtxoCache`] can hold
/// its own clone of the same handle without borrowing from `BlockStore`.
pub struct BlockStore {
    root: PathBuf,
    store: Arc<Store>,
    files: BlockFileWriter,
}

impl BlockStore {
    /// Opens (or creates) the KV database and the block-file directory.
    /// `magic` tags every framed block/undo record (§4.5).
    pub fn open(chain_dir: &Path, magic: [u8; 4]) -> Result<Self, String> {
        let root = block_store_path(chain_dir);
        std::fs::create_dir_all(&root)
            .map_err(|e| format!("create block store dir {}: {e}", root.display()))?;
        let store = Arc::new(Store::open(&root.join("index.redb"))?);
        let files = BlockFileWriter::new(&root, magic);
        Ok(Self { root, store, files })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// A cheap clone of the store handle, for components (the UTXO cache)
    /// that need to own their own reference rather than borrow one.
    pub fn store_handle(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn files(&self) -> &BlockFileWriter {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_block_dir_and_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        {
            let bs = BlockStore::open(dir.path(), *b"CBIT").unwrap();
            assert!(bs.root_dir().is_dir());
        }
        let bs = BlockStore::open(dir.path(), *b"CBIT").unwrap();
        assert_eq!(bs.store().get_last_file_no().unwrap(), 0);
    }
}
