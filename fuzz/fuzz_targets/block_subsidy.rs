#![no_main]

use libfuzzer_sys::fuzz_target;

use corebit_consensus::block_subsidy;

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let height = u64::from_le_bytes(data[..8].try_into().unwrap());

    let s1 = block_subsidy(height);
    let s2 = block_subsidy(height);
    if s1 != s2 {
        panic!("block_subsidy non-deterministic: {s1} != {s2}");
    }
    if height == 0 && s1 == 0 {
        panic!("block_subsidy(0) unexpectedly zero");
    }
});
