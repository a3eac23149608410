#![no_main]

use libfuzzer_sys::fuzz_target;

use corebit_consensus::compactsize::{compact_size_encode, read_compact_size};
use corebit_consensus::wire_read::Reader;

fuzz_target!(|data: &[u8]| {
    let mut r = Reader::new(data);
    let start = r.offset();
    let Ok((n, nbytes)) = read_compact_size(&mut r) else {
        return;
    };
    let prefix = &data[start..start + nbytes];
    let enc = compact_size_encode(n);
    if enc != prefix {
        panic!("non-minimal or mismatch: got={enc:02x?} want_prefix={prefix:02x?}");
    }
});
