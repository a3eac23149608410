//! redb-backed persistent storage (§4.3, §6): block index, the Coins
//! table, and the small single-row meta table holding `'l'`/`'B'`/`'F'`.
//! Undo data lives in the `rev*.dat` files (§4.5), not this KV store.

use std::path::Path;

use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, WriteTransaction};

use crate::keys::{
    decode_block_index, decode_coins, decode_file_info, encode_block_index, encode_coins,
    encode_file_info, BlockIndexEntry, FileInfo,
};
use corebit_consensus::Coins;

// ---------------------------------------------------------------------------
// Table definitions — one redb table per KV namespace prefix (§6).
// ---------------------------------------------------------------------------

/// `'b' || hash → BlockIndexEntry`
const BLOCK_INDEX_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("block_index_by_hash");
/// `'f' || file_no → FileInfo`
const FILE_INFO_TABLE: TableDefinition<u32, &[u8]> = TableDefinition::new("file_info_by_no");
/// `'c' || txid → Coins` — the persistent backing store under corebit-chain's cache.
const COINS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("coins_by_txid");
/// `'t' || tx_hash → (file_no, offset)`, populated only when tx-index is enabled.
const TX_INDEX_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tx_index_by_hash");
/// single-row scalars: `'l'` (last_file_no) and `'B'` (best_block_hash), plus `'F'||flag_name` rows.
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const META_KEY_LAST_FILE_NO: &str = "l";
const META_KEY_BEST_BLOCK: &str = "B";
const META_FLAG_PREFIX: &str = "F:";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) a redb database at `path`, ensuring every table exists.
    pub fn open(path: &Path) -> Result<Self, String> {
        let db = Database::create(path).map_err(|e| format!("redb open: {e}"))?;
        let tx = db.begin_write().map_err(|e| format!("redb begin_write: {e}"))?;
        tx.open_table(BLOCK_INDEX_TABLE).map_err(|e| format!("create block_index table: {e}"))?;
        tx.open_table(FILE_INFO_TABLE).map_err(|e| format!("create file_info table: {e}"))?;
        tx.open_table(COINS_TABLE).map_err(|e| format!("create coins table: {e}"))?;
        tx.open_table(TX_INDEX_TABLE).map_err(|e| format!("create tx_index table: {e}"))?;
        tx.open_table(META_TABLE).map_err(|e| format!("create meta table: {e}"))?;
        tx.commit().map_err(|e| format!("redb commit: {e}"))?;
        Ok(Self { db })
    }

    /// Begin a redb write transaction. Caller stages mutations on the
    /// returned `WriteBatch`, then calls `commit()` for an atomic batch.
    pub fn begin_write(&self) -> Result<WriteBatch, String> {
        let tx = self.db.begin_write().map_err(|e| format!("begin_write: {e}"))?;
        Ok(WriteBatch { tx })
    }

    // ── Block index ─────────────────────────────────────────────────────

    pub fn get_block_index(&self, block_hash: &[u8; 32]) -> Result<Option<BlockIndexEntry>, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(BLOCK_INDEX_TABLE).map_err(|e| format!("open block_index: {e}"))?;
        match table.get(block_hash.as_slice()).map_err(|e| format!("get block_index: {e}"))? {
            Some(guard) => Ok(Some(decode_block_index(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Iterate every persisted block-index row, for rehydrating the
    /// in-memory arena (`block_index::BlockIndex::load_from_store`) at startup.
    pub fn iter_block_index<F>(&self, mut f: F) -> Result<(), String>
    where
        F: FnMut(&[u8; 32], &BlockIndexEntry),
    {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(BLOCK_INDEX_TABLE).map_err(|e| format!("open block_index: {e}"))?;
        for result in table.iter().map_err(|e| format!("block_index iter: {e}"))? {
            let (key_guard, val_guard) = result.map_err(|e| format!("block_index next: {e}"))?;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(key_guard.value());
            let entry = decode_block_index(val_guard.value())?;
            f(&hash, &entry);
        }
        Ok(())
    }

    // ── File info ───────────────────────────────────────────────────────

    pub fn get_file_info(&self, file_no: u32) -> Result<Option<FileInfo>, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(FILE_INFO_TABLE).map_err(|e| format!("open file_info: {e}"))?;
        match table.get(file_no).map_err(|e| format!("get file_info: {e}"))? {
            Some(guard) => Ok(Some(decode_file_info(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_last_file_no(&self) -> Result<u32, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        match table.get(META_KEY_LAST_FILE_NO).map_err(|e| format!("get last_file_no: {e}"))? {
            Some(guard) => {
                let bytes = guard.value();
                if bytes.len() != 4 {
                    return Err("last_file_no: corrupt meta row".into());
                }
                Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
            }
            None => Ok(0),
        }
    }

    pub fn get_best_block(&self) -> Result<Option<[u8; 32]>, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        match table.get(META_KEY_BEST_BLOCK).map_err(|e| format!("get best_block: {e}"))? {
            Some(guard) => {
                let bytes = guard.value();
                if bytes.len() != 32 {
                    return Err("best_block: corrupt meta row".into());
                }
                let mut h = [0u8; 32];
                h.copy_from_slice(bytes);
                Ok(Some(h))
            }
            None => Ok(None),
        }
    }

    pub fn get_flag(&self, name: &str) -> Result<bool, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        let key = format!("{META_FLAG_PREFIX}{name}");
        match table.get(key.as_str()).map_err(|e| format!("get flag {name}: {e}"))? {
            Some(guard) => Ok(guard.value().first().copied().unwrap_or(0) != 0),
            None => Ok(false),
        }
    }

    // ── Coins (persistent UTXO backing store, §4.2) ────────────────────

    pub fn get_coins(&self, txid: &[u8; 32]) -> Result<Option<Coins>, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(COINS_TABLE).map_err(|e| format!("open coins: {e}"))?;
        match table.get(txid.as_slice()).map_err(|e| format!("get coins: {e}"))? {
            Some(guard) => Ok(Some(decode_coins(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Iterate every persisted Coins record in key (txid) order.
    pub fn iter_coins<F>(&self, mut f: F) -> Result<(), String>
    where
        F: FnMut(&[u8; 32], &Coins),
    {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(COINS_TABLE).map_err(|e| format!("open coins: {e}"))?;
        for result in table.iter().map_err(|e| format!("coins iter: {e}"))? {
            let (key_guard, val_guard) = result.map_err(|e| format!("coins next: {e}"))?;
            let mut txid = [0u8; 32];
            txid.copy_from_slice(key_guard.value());
            let coins = decode_coins(val_guard.value())?;
            f(&txid, &coins);
        }
        Ok(())
    }

    pub fn coins_count(&self) -> Result<u64, String> {
        let tx = self.db.begin_read().map_err(|e| format!("begin_read: {e}"))?;
        let table = tx.open_table(COINS_TABLE).map_err(|e| format!("open coins: {e}"))?;
        table.len().map_err(|e| format!("coins len: {e}"))
    }

}

// ---------------------------------------------------------------------------
// WriteBatch — wraps a redb WriteTransaction for atomic multi-table writes
// ---------------------------------------------------------------------------

pub struct WriteBatch {
    tx: WriteTransaction,
}

impl WriteBatch {
    pub fn put_block_index(&self, block_hash: &[u8; 32], entry: &BlockIndexEntry) -> Result<(), String> {
        let mut table = self.tx.open_table(BLOCK_INDEX_TABLE).map_err(|e| format!("open block_index: {e}"))?;
        let value = encode_block_index(entry);
        table.insert(block_hash.as_slice(), value.as_slice()).map_err(|e| format!("put block_index: {e}"))?;
        Ok(())
    }

    pub fn put_file_info(&self, file_no: u32, info: &FileInfo) -> Result<(), String> {
        let mut table = self.tx.open_table(FILE_INFO_TABLE).map_err(|e| format!("open file_info: {e}"))?;
        let value = encode_file_info(info);
        table.insert(file_no, value.as_slice()).map_err(|e| format!("put file_info: {e}"))?;
        Ok(())
    }

    pub fn put_last_file_no(&self, file_no: u32) -> Result<(), String> {
        let mut table = self.tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        table
            .insert(META_KEY_LAST_FILE_NO, file_no.to_le_bytes().as_slice())
            .map_err(|e| format!("put last_file_no: {e}"))?;
        Ok(())
    }

    pub fn put_best_block(&self, block_hash: &[u8; 32]) -> Result<(), String> {
        let mut table = self.tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        table
            .insert(META_KEY_BEST_BLOCK, block_hash.as_slice())
            .map_err(|e| format!("put best_block: {e}"))?;
        Ok(())
    }

    pub fn put_flag(&self, name: &str, value: bool) -> Result<(), String> {
        let mut table = self.tx.open_table(META_TABLE).map_err(|e| format!("open meta: {e}"))?;
        let key = format!("{META_FLAG_PREFIX}{name}");
        table
            .insert(key.as_str(), [value as u8].as_slice())
            .map_err(|e| format!("put flag {name}: {e}"))?;
        Ok(())
    }

    pub fn put_coins(&self, txid: &[u8; 32], coins: &Coins) -> Result<(), String> {
        let mut table = self.tx.open_table(COINS_TABLE).map_err(|e| format!("open coins: {e}"))?;
        let value = encode_coins(coins);
        table.insert(txid.as_slice(), value.as_slice()).map_err(|e| format!("put coins: {e}"))?;
        Ok(())
    }

    pub fn delete_coins(&self, txid: &[u8; 32]) -> Result<(), String> {
        let mut table = self.tx.open_table(COINS_TABLE).map_err(|e| format!("open coins: {e}"))?;
        table.remove(txid.as_slice()).map_err(|e| format!("delete coins: {e}"))?;
        Ok(())
    }

    pub fn put_tx_index(&self, txid: &[u8; 32], file_no: u32, offset: u32) -> Result<(), String> {
        let mut table = self.tx.open_table(TX_INDEX_TABLE).map_err(|e| format!("open tx_index: {e}"))?;
        let mut value = Vec::with_capacity(8);
        value.extend_from_slice(&file_no.to_le_bytes());
        value.extend_from_slice(&offset.to_le_bytes());
        table.insert(txid.as_slice(), value.as_slice()).map_err(|e| format!("put tx_index: {e}"))?;
        Ok(())
    }

    /// Commit the write batch atomically.
    pub fn commit(self) -> Result<(), String> {
        self.tx.commit().map_err(|e| format!("commit: {e}"))
    }
}
