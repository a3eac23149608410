#![no_main]

use libfuzzer_sys::fuzz_target;

use corebit_consensus::pow::retarget;

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let prev_bits = u32::from_le_bytes(data[0..4].try_into().unwrap());
    let first_time = u32::from_le_bytes(data[4..8].try_into().unwrap());
    let last_time = u32::from_le_bytes(data[8..12].try_into().unwrap());

    let r1 = retarget(prev_bits, first_time, last_time);
    let r2 = retarget(prev_bits, first_time, last_time);
    match (&r1, &r2) {
        (Ok(a), Ok(b)) => {
            if a != b {
                panic!("retarget non-deterministic");
            }
        }
        (Err(_), Err(_)) => {}
        _ => panic!("retarget non-deterministic error/ok mismatch"),
    }
});
