//! The UTXO data model (§3, §4.2): a `Coins` entry bundles every output of
//! one transaction with the block metadata needed to enforce coinbase
//! maturity and BIP30.

use crate::tx::{Outpoint, Transaction, TxOutput};
use std::collections::HashMap;

/// All still-tracked outputs of one transaction. A transaction disappears
/// from the view once every output has been spent (trailing tombstones are
/// never persisted — see corebit-store's encoding).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coins {
    pub height: u64,
    pub is_coinbase: bool,
    pub outputs: Vec<Option<TxOutput>>,
}

impl Coins {
    pub fn is_fully_spent(&self) -> bool {
        self.outputs.iter().all(Option::is_none)
    }

    pub fn get(&self, index: u32) -> Option<&TxOutput> {
        self.outputs.get(index as usize).and_then(|o| o.as_ref())
    }

    pub fn spend(&mut self, index: u32) -> bool {
        match self.outputs.get_mut(index as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }
}

/// A read-only view over the current UTXO set, implemented by corebit-chain
/// over its cache and by corebit-store over the persistent tables.
pub trait UtxoView {
    fn get_coins(&self, txid: &[u8; 32]) -> Option<Coins>;
    fn has_coin(&self, op: &Outpoint) -> bool {
        self.get_coins(&op.tx_hash)
            .map(|c| c.get(op.index).is_some())
            .unwrap_or(false)
    }
}

/// An in-memory `UtxoView` used for single-process validation and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUtxoSet {
    pub coins: HashMap<[u8; 32], Coins>,
}

impl UtxoView for InMemoryUtxoSet {
    fn get_coins(&self, txid: &[u8; 32]) -> Option<Coins> {
        self.coins.get(txid).cloned()
    }
}

impl InMemoryUtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tx_outputs(&mut self, txid: [u8; 32], tx: &Transaction, height: u64, is_coinbase: bool) {
        let outputs = tx.outputs.iter().cloned().map(Some).collect();
        self.coins.insert(
            txid,
            Coins {
                height,
                is_coinbase,
                outputs,
            },
        );
    }

    pub fn spend(&mut self, op: &Outpoint) -> bool {
        let Some(coins) = self.coins.get_mut(&op.tx_hash) else {
            return false;
        };
        let ok = coins.spend(op.index);
        if ok && coins.is_fully_spent() {
            self.coins.remove(&op.tx_hash);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{TxInput, NULL_OUTPOINT_INDEX};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_outpoint: Outpoint {
                    tx_hash: [0u8; 32],
                    index: NULL_OUTPOINT_INDEX,
                },
                script_sig: vec![],
                sequence: 0xffff_ffff,
            }],
            outputs: vec![
                TxOutput {
                    value: 10,
                    script_pubkey: vec![1],
                },
                TxOutput {
                    value: 20,
                    script_pubkey: vec![2],
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn fully_spent_coins_disappear() {
        let mut set = InMemoryUtxoSet::new();
        let tx = sample_tx();
        let txid = [0xaa; 32];
        set.add_tx_outputs(txid, &tx, 10, true);

        assert!(set.has_coin(&Outpoint { tx_hash: txid, index: 0 }));
        assert!(set.spend(&Outpoint { tx_hash: txid, index: 0 }));
        assert!(set.coins.contains_key(&txid), "one output still unspent");

        assert!(set.spend(&Outpoint { tx_hash: txid, index: 1 }));
        assert!(!set.coins.contains_key(&txid), "all outputs spent, record gone");
    }

    #[test]
    fn double_spend_fails() {
        let mut set = InMemoryUtxoSet::new();
        let tx = sample_tx();
        let txid = [0xbb; 32];
        set.add_tx_outputs(txid, &tx, 10, true);
        let op = Outpoint { tx_hash: txid, index: 0 };
        assert!(set.spend(&op));
        assert!(!set.spend(&op));
    }
}
