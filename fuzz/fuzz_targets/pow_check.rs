#![no_main]

use libfuzzer_sys::fuzz_target;

use corebit_consensus::{check_proof_of_work, BlockHeader, BLOCK_HEADER_BYTES};

fuzz_target!(|data: &[u8]| {
    if data.len() < BLOCK_HEADER_BYTES {
        return;
    }
    let Ok(header) = BlockHeader::from_bytes(&data[..BLOCK_HEADER_BYTES]) else {
        return;
    };
    let _ = check_proof_of_work(&header);
});
