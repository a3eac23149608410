//! The persistent UTXO cache (§4.2): an in-memory `txid -> Coins` layer over
//! corebit-store's Coins table, with dirty tracking so `flush` only writes
//! what a block's connection or disconnection actually changed.
//!
//! Implements [`UtxoView`] directly so `corebit_consensus::validate` never
//! has to know it's talking to a store-backed cache rather than a plain
//! `InMemoryUtxoSet`. `get_coins` takes `&self` and returns no `Result` by
//! that trait's contract, so load-through uses `RefCell` internally and
//! stashes any I/O error for the caller to drain afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use corebit_consensus::{Coins, Outpoint, Transaction, UtxoView};
use corebit_store::{Store, UndoEntry, UndoRecord};

struct CacheEntry {
    coins: Option<Coins>,
    /// Not yet present in the backing store — if it ends up fully spent
    /// before a flush, it can simply be dropped rather than written and
    /// immediately deleted.
    fresh: bool,
    dirty: bool,
}

impl Clone for CacheEntry {
    fn clone(&self) -> Self {
        Self { coins: self.coins.clone(), fresh: self.fresh, dirty: self.dirty }
    }
}

/// A point-in-time copy of the cache, taken before a block's worth of
/// `spend`/`add_tx` calls and handed back to [`UtxoCache::restore`] if that
/// block turns out to fail validation partway through (§4.4 steps 5-7:
/// "either all take effect or none"). Cheap relative to a block's own
/// script-verification cost; the alternative (a per-block child view a la
/// a stacked `CCoinsViewCache`) buys nothing this crate needs.
pub struct UtxoCacheSnapshot {
    cache: HashMap<[u8; 32], CacheEntry>,
    best_block: Option<[u8; 32]>,
}

pub struct UtxoCache {
    store: Arc<Store>,
    cache: RefCell<HashMap<[u8; 32], CacheEntry>>,
    best_block: RefCell<Option<[u8; 32]>>,
    last_error: RefCell<Option<String>>,
}

impl UtxoCache {
    pub fn load(store: Arc<Store>) -> Result<Self, String> {
        let best_block = store.get_best_block()?;
        Ok(Self {
            store,
            cache: RefCell::new(HashMap::new()),
            best_block: RefCell::new(best_block),
            last_error: RefCell::new(None),
        })
    }

    pub fn best_block(&self) -> Option<[u8; 32]> {
        *self.best_block.borrow()
    }

    pub fn set_best_block(&self, hash: [u8; 32]) {
        *self.best_block.borrow_mut() = Some(hash);
    }

    /// Drains the first store I/O error observed since the last call, if
    /// any. The activator checks this after any `validate::` call that
    /// went through `UtxoView::get_coins` and came back looking like a
    /// plain missing-UTXO rejection — it may actually be a read failure.
    pub fn take_error(&self) -> Option<String> {
        self.last_error.borrow_mut().take()
    }

    fn load_through(&self, txid: &[u8; 32]) -> Result<(), String> {
        if self.cache.borrow().contains_key(txid) {
            return Ok(());
        }
        let coins = self.store.get_coins(txid)?;
        self.cache
            .borrow_mut()
            .insert(*txid, CacheEntry { coins, fresh: false, dirty: false });
        Ok(())
    }

    pub fn get(&self, txid: &[u8; 32]) -> Result<Option<Coins>, String> {
        self.load_through(txid)?;
        Ok(self.cache.borrow().get(txid).and_then(|e| e.coins.clone()))
    }

    /// §4.2 `add_tx`: records every output of one transaction as unspent.
    /// `fresh` unless the hash already exists in the backing store (the
    /// BIP30 duplicate-coinbase case).
    pub fn add_tx(&self, txid: [u8; 32], tx: &Transaction, height: u64, is_coinbase: bool) -> Result<(), String> {
        let already_in_store = self.store.get_coins(&txid)?.is_some();
        let outputs = tx.outputs.iter().cloned().map(Some).collect();
        self.cache.borrow_mut().insert(
            txid,
            CacheEntry {
                coins: Some(Coins { height, is_coinbase, outputs }),
                fresh: !already_in_store,
                dirty: true,
            },
        );
        Ok(())
    }

    /// §4.2 `spend`: tombstones `outputs[op.index]` and returns an undo
    /// entry carrying enough to restore it on disconnect. `None` if the
    /// output doesn't exist or is already spent.
    pub fn spend(&self, op: &Outpoint) -> Result<Option<UndoEntry>, String> {
        self.load_through(&op.tx_hash)?;
        let mut cache = self.cache.borrow_mut();
        let entry = cache.get_mut(&op.tx_hash).expect("load_through just inserted this entry");
        let Some(coins) = entry.coins.as_mut() else { return Ok(None) };
        let idx = op.index as usize;
        let Some(slot) = coins.outputs.get_mut(idx) else { return Ok(None) };
        let Some(output) = slot.take() else { return Ok(None) };

        let restored_height = coins.height;
        let restored_is_coinbase = coins.is_coinbase;
        let now_empty = coins.is_fully_spent();
        entry.dirty = true;
        if now_empty {
            if entry.fresh {
                cache.remove(&op.tx_hash);
            } else {
                entry.coins = None;
            }
        }

        Ok(Some(UndoEntry {
            outpoint: op.clone(),
            restored_output: output,
            restored_height,
            restored_is_coinbase,
        }))
    }

    /// Reverses one block's worth of `add_tx`/`spend` calls (§4.4
    /// `disconnect_tip`): drops every transaction the block created, then
    /// restores every output it spent, in reverse of spend order so a
    /// block that both created and later re-spent an output within itself
    /// still unwinds correctly.
    pub fn apply_undo(&self, record: &UndoRecord) -> Result<(), String> {
        for txid in &record.created_txids {
            self.load_through(txid)?;
            self.cache.borrow_mut().insert(*txid, CacheEntry { coins: None, fresh: false, dirty: true });
        }
        for entry in record.spent.iter().rev() {
            self.restore(entry)?;
        }
        Ok(())
    }

    fn restore(&self, undo: &UndoEntry) -> Result<(), String> {
        self.load_through(&undo.outpoint.tx_hash)?;
        let mut cache = self.cache.borrow_mut();
        let entry = cache.get_mut(&undo.outpoint.tx_hash).expect("load_through just inserted this entry");
        let idx = undo.outpoint.index as usize;
        let coins = entry.coins.get_or_insert_with(|| Coins {
            height: undo.restored_height,
            is_coinbase: undo.restored_is_coinbase,
            outputs: Vec::new(),
        });
        if coins.outputs.len() <= idx {
            coins.outputs.resize(idx + 1, None);
        }
        coins.outputs[idx] = Some(undo.restored_output.clone());
        entry.dirty = true;
        Ok(())
    }

    /// Captures the current cache contents so a failed block's partial
    /// mutations can be undone without disturbing any earlier block in the
    /// same activation pass that already connected cleanly.
    pub fn snapshot(&self) -> UtxoCacheSnapshot {
        UtxoCacheSnapshot {
            cache: self.cache.borrow().clone(),
            best_block: *self.best_block.borrow(),
        }
    }

    /// Discards every mutation made since `snapshot` was taken.
    pub fn restore(&self, snapshot: UtxoCacheSnapshot) {
        *self.cache.borrow_mut() = snapshot.cache;
        *self.best_block.borrow_mut() = snapshot.best_block;
    }

    /// §4.2 `flush`: one write batch covering every dirty entry plus the
    /// best-block marker — either the whole thing lands or none of it does.
    pub fn flush(&self) -> Result<(), String> {
        let wb = self.store.begin_write()?;
        for (txid, entry) in self.cache.borrow().iter() {
            if !entry.dirty {
                continue;
            }
            match &entry.coins {
                Some(coins) => wb.put_coins(txid, coins)?,
                None => wb.delete_coins(txid)?,
            }
        }
        if let Some(best) = *self.best_block.borrow() {
            wb.put_best_block(&best)?;
        }
        wb.commit()?;

        let mut cache = self.cache.borrow_mut();
        cache.retain(|_, e| e.coins.is_some());
        for entry in cache.values_mut() {
            entry.dirty = false;
            entry.fresh = false;
        }
        Ok(())
    }
}

impl UtxoView for UtxoCache {
    fn get_coins(&self, txid: &[u8; 32]) -> Option<Coins> {
        match self.get(txid) {
            Ok(coins) => coins,
            Err(e) => {
                *self.last_error.borrow_mut() = Some(e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebit_consensus::{TxInput, TxOutput, NULL_OUTPOINT_INDEX};

    fn coinbase(value: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_outpoint: Outpoint { tx_hash: [0; 32], index: NULL_OUTPOINT_INDEX },
                script_sig: vec![1, 2],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![TxOutput { value, script_pubkey: vec![0xaa] }],
            lock_time: 0,
        }
    }

    fn open_cache() -> (tempfile::TempDir, UtxoCache) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("db.redb")).unwrap());
        let cache = UtxoCache::load(store).unwrap();
        (dir, cache)
    }

    #[test]
    fn add_then_spend_then_undo_round_trips() {
        let (_dir, cache) = open_cache();
        let tx = coinbase(5_000_000_000);
        let txid = tx.txid();
        cache.add_tx(txid, &tx, 1, true).unwrap();

        let op = Outpoint { tx_hash: txid, index: 0 };
        assert!(cache.get(&txid).unwrap().is_some());

        let undo = cache.spend(&op).unwrap().expect("output existed");
        match cache.get(&txid).unwrap() {
            Some(c) => assert!(c.get(0).is_none()),
            None => {}
        }

        let mut record = UndoRecord::default();
        record.spent.push(undo);
        cache.apply_undo(&record).unwrap();
        assert!(cache.get(&txid).unwrap().unwrap().get(0).is_some());
    }

    #[test]
    fn restore_undoes_every_mutation_made_since_the_snapshot() {
        let (_dir, cache) = open_cache();
        let tx = coinbase(5_000_000_000);
        let txid = tx.txid();
        cache.add_tx(txid, &tx, 1, true).unwrap();
        cache.set_best_block(txid);
        cache.flush().unwrap();

        let snapshot = cache.snapshot();
        let op = Outpoint { tx_hash: txid, index: 0 };
        cache.spend(&op).unwrap();
        let other = coinbase(7_000_000_000);
        cache.add_tx(other.txid(), &other, 2, true).unwrap();
        cache.set_best_block(other.txid());

        cache.restore(snapshot);

        assert!(cache.get(&txid).unwrap().unwrap().get(0).is_some());
        assert!(cache.get(&other.txid()).unwrap().is_none());
        assert_eq!(cache.best_block(), Some(txid));
    }

    #[test]
    fn flush_persists_dirty_entries_to_the_backing_store() {
        let (_dir, cache) = open_cache();
        let tx = coinbase(5_000_000_000);
        let txid = tx.txid();
        cache.add_tx(txid, &tx, 1, true).unwrap();
        cache.set_best_block(txid);
        cache.flush().unwrap();

        assert_eq!(cache.store.get_best_block().unwrap(), Some(txid));
        assert!(cache.store.get_coins(&txid).unwrap().is_some());
    }

    #[test]
    fn disconnect_undoes_a_block_the_cache_never_flushed() {
        let (_dir, cache) = open_cache();
        let tx = coinbase(5_000_000_000);
        let txid = tx.txid();
        cache.add_tx(txid, &tx, 1, true).unwrap();

        let mut record = UndoRecord::default();
        record.created_txids.push(txid);
        cache.apply_undo(&record).unwrap();

        assert!(cache.get(&txid).unwrap().is_none());
    }
}
