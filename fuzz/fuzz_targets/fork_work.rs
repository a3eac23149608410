#![no_main]

use libfuzzer_sys::fuzz_target;

use corebit_consensus::fork_choice::cumulative_work;

fuzz_target!(|data: &[u8]| {
    let n = data.len() / 4;
    let mut bits_sequence = Vec::with_capacity(n);
    for i in 0..n {
        bits_sequence.push(u32::from_le_bytes(data[i * 4..(i + 1) * 4].try_into().unwrap()));
    }

    let w1 = cumulative_work(&bits_sequence);
    let w2 = cumulative_work(&bits_sequence);
    if w1 != w2 {
        panic!("cumulative_work non-deterministic");
    }
});
