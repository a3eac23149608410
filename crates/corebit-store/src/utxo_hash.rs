//! Canonical `utxo_set_hash` computation over the persistent Coins table,
//! used by corebit-chain to cross-check its in-memory cache against the
//! backing store after a flush.
//!
//! `utxo_set_hash = dsha256(DST || n_le[8] || pair_0 || pair_1 || ...)`
//! where `pair_i = txid || coins_canonical_bytes`, ordered by txid.

use corebit_consensus::dsha256;

use crate::db::Store;
use crate::keys::encode_coins;

const DST: &[u8] = b"corebit-utxo-set-hash/v1/";

pub fn utxo_set_hash(store: &Store) -> Result<[u8; 32], String> {
    let count = store.coins_count()?;

    let mut preimage = Vec::new();
    preimage.extend_from_slice(DST);
    preimage.extend_from_slice(&count.to_le_bytes());

    store.iter_coins(|txid, coins| {
        preimage.extend_from_slice(txid);
        preimage.extend_from_slice(&encode_coins(coins));
    })?;

    Ok(dsha256(&preimage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebit_consensus::{Coins, TxOutput};
    use tempfile::tempdir;

    #[test]
    fn hash_changes_when_a_coin_is_added() {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("store.redb")).unwrap();
        let empty_hash = utxo_set_hash(&store).unwrap();

        let coins = Coins {
            height: 1,
            is_coinbase: true,
            outputs: vec![Some(TxOutput { value: 5_000_000_000, script_pubkey: vec![0xaa] })],
        };
        let wb = store.begin_write().unwrap();
        wb.put_coins(&[0x11; 32], &coins).unwrap();
        wb.commit().unwrap();

        let new_hash = utxo_set_hash(&store).unwrap();
        assert_ne!(empty_hash, new_hash);
    }

    #[test]
    fn hash_is_order_independent_of_insertion_sequence() {
        let dir1 = tempdir().unwrap();
        let store1 = Store::open(&dir1.path().join("store.redb")).unwrap();
        let dir2 = tempdir().unwrap();
        let store2 = Store::open(&dir2.path().join("store.redb")).unwrap();

        let c1 = Coins { height: 1, is_coinbase: true, outputs: vec![Some(TxOutput { value: 1, script_pubkey: vec![] })] };
        let c2 = Coins { height: 2, is_coinbase: false, outputs: vec![Some(TxOutput { value: 2, script_pubkey: vec![] })] };

        let wb1 = store1.begin_write().unwrap();
        wb1.put_coins(&[0x01; 32], &c1).unwrap();
        wb1.put_coins(&[0x02; 32], &c2).unwrap();
        wb1.commit().unwrap();

        let wb2 = store2.begin_write().unwrap();
        wb2.put_coins(&[0x02; 32], &c2).unwrap();
        wb2.put_coins(&[0x01; 32], &c1).unwrap();
        wb2.commit().unwrap();

        assert_eq!(utxo_set_hash(&store1).unwrap(), utxo_set_hash(&store2).unwrap());
    }
}
