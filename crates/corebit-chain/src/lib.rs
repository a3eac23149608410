//! `corebit-chain` — the chain activator (§4.4): wires corebit-consensus's
//! validation rules and corebit-store's index/KV/file storage into the one
//! state machine that decides which chain is active. A host drives this
//! crate's `ChainState` directly; there is no network or RPC surface here.

pub mod blockstore;
pub mod chainstate;
pub mod error;
pub mod events;
pub mod params;
pub mod script_queue;
pub mod utxo_cache;

pub use blockstore::{block_store_path, BlockStore, BLOCK_STORE_DIR_NAME};
pub use chainstate::{ActivationOutcome, ChainState};
pub use error::ChainError;
pub use events::{ChainNotify, EventBus};
pub use params::ChainParams;
pub use script_queue::{CheckQueueControl, ScriptCheckQueue};
pub use utxo_cache::UtxoCache;
