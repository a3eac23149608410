#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let n_txids = data.len() / 32;
    let mut txids = Vec::with_capacity(n_txids);
    for i in 0..n_txids {
        let mut id = [0u8; 32];
        id.copy_from_slice(&data[i * 32..(i + 1) * 32]);
        txids.push(id);
    }

    let r1 = corebit_consensus::compute_merkle_root(&txids);
    let r2 = corebit_consensus::compute_merkle_root(&txids);
    if r1.root != r2.root || r1.mutated != r2.mutated {
        panic!("compute_merkle_root non-deterministic");
    }
});
