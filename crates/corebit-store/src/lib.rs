//! `corebit-store` — persistent storage layer (§4.3, §4.5, §6): a redb-backed
//! block index, the Coins/undo KV tables, block/undo file framing, and
//! MANIFEST.json crash recovery. No validation logic lives here; that is
//! corebit-consensus's job, driven by corebit-chain.

pub mod block_index;
pub mod db;
pub mod keys;
pub mod manifest;
pub mod pipeline;
pub mod utxo_hash;

pub use block_index::{BlockIndex, BlockRef, IndexEntry};
pub use db::{Store, WriteBatch};
pub use keys::{
    BlockIndexEntry, FileInfo, UndoEntry, UndoRecord, ValidityTier, STATUS_FAILED_CHILD,
    STATUS_FAILED_VALID, STATUS_HAVE_DATA, STATUS_HAVE_UNDO,
};
pub use manifest::Manifest;
pub use pipeline::{BlockFileWriter, MAX_BLOCKFILE_SIZE};
pub use utxo_hash::utxo_set_hash;
