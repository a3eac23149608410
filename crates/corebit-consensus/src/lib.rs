//! corebit consensus library: block/transaction wire formats, proof-of-work,
//! the UTXO data model, and the validation rules a block must satisfy to
//! extend the chain.
//!
//! This crate implements consensus only. Anything not required for every
//! honest node to agree on the same chain — networking, wallet policy,
//! script interpretation — lives elsewhere or behind a trait boundary.

pub mod block;
pub mod block_basic;
pub mod compactsize;
pub mod connect_block_inmem;
pub mod constants;
pub mod error;
pub mod featurebits;
pub mod fork_choice;
pub mod hash;
pub mod merkle;
pub mod pow;
pub mod subsidy;
pub mod tx;
pub mod util;
pub mod utxo_basic;
pub mod validate;
pub mod wire_read;

pub use block::{bits_from_target, target_from_bits, target_to_bytes_be, BlockHeader, BLOCK_HEADER_BYTES};
pub use block_basic::{check_block, check_transaction, max_block_size, parse_block, Block, BlockBasicSummary};
pub use error::{ErrorCode, RejectKind, TxError};
pub use hash::dsha256;
pub use merkle::{compute_merkle_root, MerkleResult};
pub use pow::{check_proof_of_work, is_retarget_height, retarget, work_from_bits};
pub use subsidy::block_subsidy;
pub use tx::{parse_tx, Outpoint, Transaction, TxInput, TxOutput, NULL_OUTPOINT_INDEX};
pub use utxo_basic::{Coins, InMemoryUtxoSet, UtxoView};
