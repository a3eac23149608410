//! The chain activator (§4.4): the only place that turns accepted headers
//! and block bodies into the single active chain, via `accept_header` /
//! `accept_block` and the `activate_best_chain` search over the block
//! index's candidate set.
//!
//! `ChainState` is not internally locked — a host wraps one in its own
//! `Mutex<ChainState<V>>` to get the single coarse `chain_lock` of §5.
//! Script verification is the one piece of work this module pushes outside
//! that lock: each block's checks are collected by a [`CheckQueueControl`]
//! and run on [`ScriptCheckQueue`]'s worker threads, joined back in before
//! the block is committed or rejected.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use corebit_consensus::constants::{MAJORITY_WINDOW, MEDIAN_TIME_SPAN, RETARGET_INTERVAL};
use corebit_consensus::util::{count_version_signals, median_time_past};
use corebit_consensus::validate::{
    check_bip30, check_coinbase_height, check_header_difficulty, check_header_future_drift,
    check_header_time, check_inputs, check_transaction_finality, check_version_super_majority,
    AncestorMtp,
};
use corebit_consensus::{
    block_subsidy, check_block, check_proof_of_work, is_retarget_height, parse_block, Block,
    BlockHeader, ErrorCode, TxError,
};
use corebit_store::keys::{decode_undo_record, encode_undo_record};
use corebit_store::{BlockIndex, BlockRef, Manifest, UndoRecord, ValidityTier};
use corebit_script::{ScriptFlags, ScriptSigContext, ScriptVerifier, SCRIPT_VERIFY_MANDATORY};

use crate::blockstore::BlockStore;
use crate::error::ChainError;
use crate::events::{ChainNotify, EventBus};
use crate::params::ChainParams;
use crate::script_queue::{CheckQueueControl, ScriptCheckQueue};
use crate::utxo_cache::UtxoCache;

/// Flags deployed by height threshold (§9: no block-by-block BIP9 tracking
/// here — see DESIGN.md). Bits 0/1 are reserved by corebit-script's own
/// `SCRIPT_VERIFY_MANDATORY`/`SCRIPT_VERIFY_STANDARD_EXTRA`.
const FLAG_P2SH: ScriptFlags = 1 << 2;
const FLAG_DERSIG: ScriptFlags = 1 << 3;
const FLAG_CLTV: ScriptFlags = 1 << 4;
const FLAG_CSV: ScriptFlags = 1 << 5;

/// Result of a call that may have advanced (or rolled back) the tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub height: u64,
    pub tip_hash: [u8; 32],
}

/// The chain activator. Generic over the script verifier so a host can
/// plug in a real engine without this crate depending on one.
pub struct ChainState<V: ScriptVerifier + Sync> {
    params: ChainParams,
    block_store: BlockStore,
    index: BlockIndex,
    utxo: UtxoCache,
    verifier: V,
    script_queue: ScriptCheckQueue,
    events: EventBus,
    /// The active chain, genesis-first. `active[height] == BlockRef` at
    /// that height; `active.last()` is the tip.
    active: Vec<BlockRef>,
    manifest: Manifest,
    manifest_path: PathBuf,
    cancel: Arc<AtomicBool>,
    tip_signal: Arc<(Mutex<u64>, Condvar)>,
    /// The most recent consensus rejection `activate_best_chain` recorded
    /// while marking a candidate `FAILED_VALID`, keyed by which block it
    /// was. `accept_block` consults this to report *why* the exact block it
    /// was just handed got rejected, even though the activation loop itself
    /// presses on to whatever candidate is next-best rather than bubbling
    /// the error up directly (§4.4: one bad branch must not stop the search
    /// for the actual best chain).
    last_rejection: Option<(BlockRef, TxError)>,
}

impl<V: ScriptVerifier + Sync> ChainState<V> {
    /// Opens (or initializes) chain state rooted at `chain_dir`. On first
    /// run, seeds genesis directly into the active chain: genesis is never
    /// run through `connect_block` (there's nothing to validate against an
    /// empty UTXO set), and `mark_data(.., tx_count=0)` deliberately leaves
    /// it permanently ineligible for the candidate set, so it can only ever
    /// be `active[0]`.
    pub fn open(
        chain_dir: &Path,
        params: ChainParams,
        magic: [u8; 4],
        script_workers: usize,
        verifier: V,
    ) -> Result<Self, ChainError> {
        let block_store = BlockStore::open(chain_dir, magic).map_err(ChainError::internal)?;
        let mut index = BlockIndex::load_from_store(block_store.store()).map_err(ChainError::internal)?;
        let utxo = UtxoCache::load(block_store.store_handle()).map_err(ChainError::internal)?;
        let manifest_path = Manifest::path_in(chain_dir);

        let genesis_hash = params.genesis_header.block_hash();
        debug_assert_eq!(
            genesis_hash, params.genesis_hash,
            "ChainParams.genesis_hash does not match the hash of genesis_header"
        );

        let (active, manifest) = if index.by_hash(&genesis_hash).is_none() {
            let r = index
                .insert_header(
                    genesis_hash,
                    None,
                    params.genesis_header.time,
                    params.genesis_header.bits,
                    params.genesis_header.version,
                )
                .map_err(ChainError::internal)?;
            // tx_count = 1: genesis carries one coinbase transaction, same as
            // every other block. A real count matters here — it's what seeds
            // `chain_tx_count` for genesis's children in `mark_data`'s
            // ancestors-have-data gate (block_index.rs); zero would leave
            // every direct child of genesis stuck in the unlinked map
            // forever, since genesis's own `mark_data` never runs again.
            index.mark_data(&genesis_hash, 0, 0, 1).map_err(ChainError::internal)?;
            index.flush_all(block_store.store()).map_err(ChainError::internal)?;

            utxo.set_best_block(genesis_hash);
            utxo.flush().map_err(ChainError::internal)?;

            let genesis_work =
                corebit_consensus::work_from_bits(params.genesis_header.bits).map_err(ChainError::from)?;
            let manifest = Manifest::genesis(&hex32(&genesis_hash), &genesis_work);
            manifest.save_atomic(&manifest_path).map_err(ChainError::internal)?;
            (vec![r], manifest)
        } else {
            let manifest = Manifest::load(&manifest_path).map_err(ChainError::internal)?;
            let tip_hash = manifest.tip_hash_bytes().map_err(ChainError::internal)?;
            let tip_ref = index
                .by_hash(&tip_hash)
                .ok_or_else(|| ChainError::internal("manifest tip hash is not present in the block index"))?;
            (path_from_genesis(&index, tip_ref), manifest)
        };

        let height = index.get(*active.last().expect("active chain always has at least genesis")).height;

        Ok(Self {
            params,
            block_store,
            index,
            utxo,
            verifier,
            script_queue: ScriptCheckQueue::new(script_workers),
            events: EventBus::new(),
            active,
            manifest,
            manifest_path,
            cancel: Arc::new(AtomicBool::new(false)),
            tip_signal: Arc::new((Mutex::new(height), Condvar::new())),
            last_rejection: None,
        })
    }

    pub fn register_observer(&mut self, observer: Box<dyn ChainNotify>) {
        self.events.register(observer);
    }

    pub fn tip_ref(&self) -> BlockRef {
        *self.active.last().expect("active chain always has at least genesis")
    }

    pub fn tip_hash(&self) -> [u8; 32] {
        self.index.get(self.tip_ref()).hash
    }

    pub fn height(&self) -> u64 {
        self.index.get(self.tip_ref()).height
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn request_shutdown(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Blocks (up to `timeout`) until the tip reaches at least `target`
    /// height. Returns whether it did.
    pub fn wait_for_height(&self, target: u64, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.tip_signal;
        let guard = lock.lock().expect("tip_signal mutex poisoned");
        let (guard, _timed_out) = cvar
            .wait_timeout_while(guard, timeout, |h| *h < target)
            .expect("tip_signal mutex poisoned");
        *guard >= target
    }

    fn signal_tip(&self) {
        let (lock, cvar) = &*self.tip_signal;
        let mut h = lock.lock().expect("tip_signal mutex poisoned");
        *h = self.height();
        cvar.notify_all();
    }

    // ── Header acceptance (§4.1.2/§4.1.3) ──────────────────────────────

    /// Validates and inserts one header (idempotent by hash). Does not
    /// touch the active chain — only `activate_best_chain` does that.
    pub fn accept_header(&mut self, header: &BlockHeader) -> Result<BlockRef, ChainError> {
        let hash = header.block_hash();
        if let Some(r) = self.index.by_hash(&hash) {
            return Ok(r);
        }

        check_proof_of_work(header)?;
        check_header_future_drift(header, now_unix())?;

        let prev_ref = self
            .index
            .by_hash(&header.prev_hash)
            .ok_or_else(|| ChainError::internal("accept_header: unknown parent"))?;
        let (height, prev_bits) = {
            let prev = self.index.get(prev_ref);
            (prev.height + 1, prev.bits)
        };

        check_header_time(header, &self.ancestor_times(prev_ref, MEDIAN_TIME_SPAN))?;
        let window = self.retarget_window(prev_ref, height);
        check_header_difficulty(header, height, prev_bits, window)?;

        if let Some((fork_height, fork_hash)) = self.params.enforced_fork_block {
            if height == fork_height && hash != fork_hash {
                return Err(TxError::new(
                    ErrorCode::BlockErrForkMismatch,
                    "header at enforced fork height does not match the required hash",
                )
                .into());
            }
        }

        let recent_versions = self.ancestor_versions(prev_ref, MAJORITY_WINDOW as usize);
        for min_version in [2, 3, 4] {
            let signal_count = count_version_signals(&recent_versions, min_version);
            check_version_super_majority(header.version, min_version, signal_count)?;
        }

        let r = self
            .index
            .insert_header(hash, Some(header.prev_hash), header.time, header.bits, header.version)
            .map_err(ChainError::internal)?;
        Ok(r)
    }

    /// Accepts one fully serialized block: its header (if not already
    /// known), its body, and then drives `activate_best_chain` so the new
    /// data can change the tip if it's now the best candidate.
    pub fn accept_block(&mut self, raw: &[u8]) -> Result<ActivationOutcome, ChainError> {
        let block = parse_block(raw)?;
        let hash = block.header.block_hash();
        let r = self.accept_header(&block.header)?;

        if self.index.get(r).have_data() {
            return Ok(ActivationOutcome { height: self.height(), tip_hash: self.tip_hash() });
        }

        if let Err(e) = check_block(&block) {
            self.index.mark_failed_valid(r);
            self.index.flush_all(self.block_store.store()).map_err(ChainError::internal)?;
            return Err(e.into());
        }

        let height = self.index.get(r).height;
        let (file_no, data_offset, _info) = self
            .block_store
            .files()
            .append_block(self.block_store.store(), raw, height, block.header.time)
            .map_err(ChainError::internal)?;

        self.index
            .mark_data(&hash, file_no, data_offset, block.transactions.len() as u32)
            .map_err(ChainError::internal)?;
        self.index.flush_all(self.block_store.store()).map_err(ChainError::internal)?;

        let outcome = self.activate_best_chain()?;

        // The block just handed in may have been the one that failed
        // consensus during activation (rather than some other competing
        // candidate) — report that to this specific caller even though
        // `activate_best_chain` itself doesn't treat it as fatal.
        if self.index.get(r).failed_valid() {
            if let Some((failed_ref, e)) = self.last_rejection.take() {
                if failed_ref == r {
                    return Err(ChainError::Consensus(e));
                }
                self.last_rejection = Some((failed_ref, e));
            }
        }

        Ok(outcome)
    }

    // ── Chain activation (§4.4) ────────────────────────────────────────

    /// Repeatedly picks the best candidate, unwinds the active chain to
    /// their common ancestor, and reconnects forward. A candidate that
    /// fails validation is marked `FAILED_VALID` (propagating `FAILED_CHILD`
    /// to its descendants) and the search retries with whatever the next
    /// best candidate now is.
    pub fn activate_best_chain(&mut self) -> Result<ActivationOutcome, ChainError> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let genesis = self.active[0];
            let target = self.index.best_candidate().unwrap_or(genesis);
            let tip = self.tip_ref();
            if target == tip {
                break;
            }

            let fork = self.index.find_fork(tip, target);
            while self.tip_ref() != fork {
                self.disconnect_one()?;
            }

            let path = connect_path(&self.index, fork, target);
            let mut branch_failed = false;
            for (i, r) in path.iter().enumerate() {
                if i > 0 && i % 32 == 0 && self.cancel.load(Ordering::SeqCst) {
                    break;
                }
                match self.connect_one(*r) {
                    Ok(()) => {}
                    Err(ChainError::Consensus(e)) => {
                        self.index.mark_failed_valid(*r);
                        tracing::warn!(
                            error = %e,
                            "block failed validation during activation; retrying with next-best candidate"
                        );
                        self.last_rejection = Some((*r, e));
                        branch_failed = true;
                        break;
                    }
                    Err(internal @ ChainError::Internal(_)) => return Err(internal),
                }
            }

            self.index.flush_all(self.block_store.store()).map_err(ChainError::internal)?;
            self.utxo.flush().map_err(ChainError::internal)?;
            self.save_manifest()?;
            self.signal_tip();
            tracing::info!(height = self.height(), tip = %hex32(&self.tip_hash()), "tip updated");

            let _ = branch_failed; // loop naturally retries with the shrunk candidate set
        }

        Ok(ActivationOutcome { height: self.height(), tip_hash: self.tip_hash() })
    }

    fn connect_one(&mut self, r: BlockRef) -> Result<(), ChainError> {
        let (height, time, file_no, data_offset, prev_ref, hash) = {
            let e = self.index.get(r);
            (e.height, e.time, e.file_no, e.data_offset, e.prev, e.hash)
        };
        let prev_ref = prev_ref.expect("connect_one: only genesis has no parent, and genesis is never connected");

        let payload = self.block_store.files().read_block_at(file_no, data_offset).map_err(ChainError::internal)?;
        let block = parse_block(&payload)?;
        check_block(&block)?;

        let prev_mtp = self.mtp_at_height(prev_ref, self.index.get(prev_ref).height);
        let bip113_active = height >= self.params.bip113_height;
        let bip68_active = height >= self.params.bip68_height;
        let finality_cutoff_time = if bip113_active { prev_mtp } else { time };
        let flags = self.script_flags_for_height(height);

        if height >= self.params.bip34_height {
            check_coinbase_height(&block.transactions[0], height)?;
        }
        if height < self.params.bip30_height {
            let coinbase_txid = block.transactions[0].txid();
            check_bip30(&coinbase_txid, height, &self.utxo, &self.params.bip30_grandfathered)
                .map_err(|e| self.wrap_utxo_error(e))?;
        }
        for tx in &block.transactions[1..] {
            check_transaction_finality(tx, height, finality_cutoff_time)?;
        }
        if let Some((fork_height, fork_hash)) = self.params.enforced_fork_block {
            if height == fork_height && hash != fork_hash {
                return Err(TxError::new(
                    ErrorCode::BlockErrForkMismatch,
                    "block at enforced fork height does not match the required hash",
                )
                .into());
            }
        }

        // §4.4 steps 5-7 must either all take effect or none: snapshot the
        // cache before touching it so any failure below — a bad input, a
        // failed script check, an over-paying coinbase — can be undone
        // without disturbing any earlier block in this same activation pass
        // that already connected cleanly.
        let snapshot = self.utxo.snapshot();
        let undo = match self.connect_transactions(&block, height, prev_mtp, bip68_active, flags, prev_ref) {
            Ok(undo) => undo,
            Err(e) => {
                self.utxo.restore(snapshot);
                return Err(e);
            }
        };

        let undo_bytes = encode_undo_record(&undo);
        let undo_offset = self
            .block_store
            .files()
            .append_undo(self.block_store.store(), file_no, &block.header.prev_hash, &undo_bytes)
            .map_err(ChainError::internal)?;
        self.index.set_have_undo(r, undo_offset);
        self.index.raise_validity(r, ValidityTier::Scripts);

        self.utxo.set_best_block(hash);
        self.active.push(r);
        self.events.fire_block_connected(&block.header, height);
        self.events.fire_updated_tip(&hash, height);

        Ok(())
    }

    /// The part of §4.4 steps 5-7 that mutates the UTXO cache: per-input
    /// checks, spends, coinbase-amount enforcement. Split out of
    /// `connect_one` so its caller can snapshot/restore around exactly this
    /// span and nothing else (header/context checks above it never touch
    /// the cache and don't need rolling back).
    fn connect_transactions(
        &mut self,
        block: &Block,
        height: u64,
        prev_mtp: u32,
        bip68_active: bool,
        flags: ScriptFlags,
        prev_ref: BlockRef,
    ) -> Result<UndoRecord, ChainError> {
        let queue_control = RefCell::new(CheckQueueControl::new(&self.script_queue));
        let deferred = DeferredVerifier { inner: &self.verifier, control: &queue_control };

        let mut undo = UndoRecord::default();
        let mut total_fees: u64 = 0;

        for tx in &block.transactions[1..] {
            let txid = tx.txid();
            let result = check_inputs(
                tx,
                height,
                prev_mtp,
                bip68_active,
                &self.utxo,
                &deferred,
                flags,
                |coin_height| AncestorMtp { coin_height, coin_ancestor_mtp: self.mtp_at_height(prev_ref, coin_height) },
            )
            .map_err(|e| self.wrap_utxo_error(e))?;
            total_fees = add_checked(total_fees, result.fee)?;

            for input in &tx.inputs {
                if let Some(entry) = self.utxo.spend(&input.prev_outpoint).map_err(ChainError::internal)? {
                    undo.spent.push(entry);
                }
            }
            self.utxo.add_tx(txid, tx, height, false).map_err(ChainError::internal)?;
            undo.created_txids.push(txid);
        }

        let control = queue_control.into_inner();
        if !control.is_empty() && !control.wait() {
            return Err(TxError::new(ErrorCode::TxErrScriptVerifyFailed, "script verification failed").into());
        }

        let coinbase = &block.transactions[0];
        let mut coinbase_value: u64 = 0;
        for out in &coinbase.outputs {
            coinbase_value = add_checked(coinbase_value, out.value)?;
        }
        let max_coinbase = add_checked(block_subsidy(height), total_fees)?;
        if coinbase_value > max_coinbase {
            return Err(TxError::new(
                ErrorCode::BlockErrBadCbAmount,
                "coinbase pays more than the subsidy plus fees",
            )
            .into());
        }
        let coinbase_txid = coinbase.txid();
        self.utxo.add_tx(coinbase_txid, coinbase, height, true).map_err(ChainError::internal)?;
        undo.created_txids.push(coinbase_txid);

        Ok(undo)
    }

    fn disconnect_one(&mut self) -> Result<(), ChainError> {
        let r = *self.active.last().expect("disconnect_one: active chain always has at least genesis");
        let (file_no, undo_offset, height, prev_ref) = {
            let e = self.index.get(r);
            (e.file_no, e.undo_offset, e.height, e.prev)
        };
        let prev_ref = prev_ref.expect("disconnect_one: cannot disconnect genesis");
        let prev_hash = self.index.get(prev_ref).hash;

        let undo_bytes = self
            .block_store
            .files()
            .read_undo_at(file_no, undo_offset, &prev_hash)
            .map_err(ChainError::internal)?;
        let record = decode_undo_record(&undo_bytes).map_err(ChainError::internal)?;
        self.utxo.apply_undo(&record).map_err(ChainError::internal)?;

        let header = self.read_header(r)?;
        self.active.pop();
        self.utxo.set_best_block(prev_hash);
        self.events.fire_block_disconnected(&header, height);
        self.events.fire_updated_tip(&prev_hash, self.index.get(prev_ref).height);
        Ok(())
    }

    // ── Manual reorg control (§4.4 Invalidate/Reconsider) ──────────────

    pub fn invalidate_block(&mut self, hash: &[u8; 32]) -> Result<ActivationOutcome, ChainError> {
        let r = self
            .index
            .by_hash(hash)
            .ok_or_else(|| ChainError::internal("invalidate_block: unknown hash"))?;
        self.index.mark_failed_valid(r);
        self.index.flush_all(self.block_store.store()).map_err(ChainError::internal)?;
        self.activate_best_chain()
    }

    pub fn reconsider_block(&mut self, hash: &[u8; 32]) -> Result<ActivationOutcome, ChainError> {
        let r = self
            .index
            .by_hash(hash)
            .ok_or_else(|| ChainError::internal("reconsider_block: unknown hash"))?;
        self.index.reconsider(r);
        self.index.flush_all(self.block_store.store()).map_err(ChainError::internal)?;
        self.activate_best_chain()
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn read_header(&self, r: BlockRef) -> Result<BlockHeader, ChainError> {
        let (file_no, data_offset) = {
            let e = self.index.get(r);
            (e.file_no, e.data_offset)
        };
        let payload = self.block_store.files().read_block_at(file_no, data_offset).map_err(ChainError::internal)?;
        Ok(parse_block(&payload)?.header)
    }

    fn ancestor_times(&self, r: BlockRef, n: usize) -> Vec<u32> {
        let mut times = Vec::with_capacity(n);
        let mut cur = Some(r);
        for _ in 0..n {
            let Some(c) = cur else { break };
            times.push(self.index.get(c).time);
            cur = self.index.get(c).prev;
        }
        times
    }

    /// The `version` field of up to `n` ancestors ending at (and including)
    /// `r`, for `check_version_super_majority` (§4.1.3). Order doesn't
    /// matter to the caller — it only counts signals within the window.
    fn ancestor_versions(&self, r: BlockRef, n: usize) -> Vec<i32> {
        let mut versions = Vec::with_capacity(n);
        let mut cur = Some(r);
        for _ in 0..n {
            let Some(c) = cur else { break };
            versions.push(self.index.get(c).version);
            cur = self.index.get(c).prev;
        }
        versions
    }

    fn retarget_window(&self, prev_ref: BlockRef, height: u64) -> Option<(u32, u32)> {
        if !is_retarget_height(height) {
            return None;
        }
        let first_height = height.checked_sub(RETARGET_INTERVAL)?;
        let first = self.index.ancestor(prev_ref, first_height)?;
        Some((self.index.get(first).time, self.index.get(prev_ref).time))
    }

    /// Median-time-past of the 11 ancestors ending at `target_height`,
    /// reached via `hint` (which must be at or above `target_height`).
    fn mtp_at_height(&self, hint: BlockRef, target_height: u64) -> u32 {
        let anc = self
            .index
            .ancestor(hint, target_height)
            .expect("mtp_at_height: target_height must not exceed hint's height");
        median_time_past(&self.ancestor_times(anc, MEDIAN_TIME_SPAN))
    }

    fn script_flags_for_height(&self, height: u64) -> ScriptFlags {
        let mut flags = SCRIPT_VERIFY_MANDATORY;
        if height >= self.params.p2sh_height {
            flags |= FLAG_P2SH;
        }
        if height >= self.params.dersig_height {
            flags |= FLAG_DERSIG;
        }
        if height >= self.params.cltv_height {
            flags |= FLAG_CLTV;
        }
        if height >= self.params.csv_height {
            flags |= FLAG_CSV;
        }
        flags
    }

    /// `UtxoView::get_coins` can't return a `Result`, so a store I/O error
    /// surfaces as a plain "missing UTXO" `TxError`. If the cache actually
    /// recorded a read failure since the call, that's what really happened.
    fn wrap_utxo_error(&self, e: TxError) -> ChainError {
        match self.utxo.take_error() {
            Some(io_err) => ChainError::Internal(io_err),
            None => ChainError::Consensus(e),
        }
    }

    fn save_manifest(&mut self) -> Result<(), ChainError> {
        let tip = self.tip_ref();
        let e = self.index.get(tip);
        let hash_hex = hex32(&e.hash);
        let height = e.height;
        let chain_work = e.chain_work.clone();
        self.manifest.update_tip(&hash_hex, height, &chain_work);
        self.manifest.save_atomic(&self.manifest_path).map_err(ChainError::internal)
    }
}

fn path_from_genesis(index: &BlockIndex, tip: BlockRef) -> Vec<BlockRef> {
    let mut path = Vec::new();
    let mut cur = Some(tip);
    while let Some(r) = cur {
        path.push(r);
        cur = index.get(r).prev;
    }
    path.reverse();
    path
}

fn connect_path(index: &BlockIndex, fork: BlockRef, tip: BlockRef) -> Vec<BlockRef> {
    let mut path = Vec::new();
    let mut cur = tip;
    while cur != fork {
        path.push(cur);
        cur = index.get(cur).prev.expect("connect_path: walked past genesis before reaching the fork point");
    }
    path.reverse();
    path
}

fn add_checked(a: u64, b: u64) -> Result<u64, ChainError> {
    a.checked_add(b).ok_or_else(|| ChainError::internal("u64 addition overflow"))
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn hex32(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Bridges `corebit_consensus::validate::check_inputs`'s synchronous
/// per-input `verifier.verify(...)` call to the worker-pool batching §4.6
/// requires: each call clones what it needs into an owned closure, queues
/// it on the shared [`CheckQueueControl`], and optimistically reports
/// success. The real verdict comes from `control.wait()` once every input
/// in the block has been queued.
struct DeferredVerifier<'v, 'q, 'env, S: ScriptVerifier + Sync> {
    inner: &'v S,
    control: &'q RefCell<CheckQueueControl<'q, 'env>>,
}

impl<'v, 'q, 'env, S: ScriptVerifier + Sync> ScriptVerifier for DeferredVerifier<'v, 'q, 'env, S>
where
    'v: 'env,
{
    fn verify(
        &self,
        script_sig: &[u8],
        script_pubkey: &[u8],
        flags: ScriptFlags,
        sig_context: &ScriptSigContext<'_>,
    ) -> Result<bool, String> {
        let script_sig = script_sig.to_vec();
        let script_pubkey = script_pubkey.to_vec();
        let tx_bytes = sig_context.tx_bytes.to_vec();
        let input_index = sig_context.input_index;
        let prev_value = sig_context.prev_value;
        let inner = self.inner;

        self.control.borrow_mut().add(move || {
            let ctx = ScriptSigContext { tx_bytes: &tx_bytes, input_index, prev_value };
            inner.verify(&script_sig, &script_pubkey, flags, &ctx).unwrap_or(false)
        });
        Ok(true)
    }
}
