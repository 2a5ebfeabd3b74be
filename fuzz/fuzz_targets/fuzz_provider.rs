//! Drives every provider operation with libFuzzer data and checks that none of
//! them fail or overdraw the cursor.

#![no_main]

use arbitrary::Unstructured;
use fuzzdata_core::{ByteCursor, EnhancedDataProvider, ScratchOptions};
use libfuzzer_sys::fuzz_target;
use std::io::Read;

const ITEMS: [u8; 6] = [1, 2, 3, 4, 5, 6];

fuzz_target!(|data: &[u8]| {
    let mut provider = EnhancedDataProvider::new(Unstructured::new(data));

    let before = provider.remaining_bytes();
    let bytes = provider.consume_random_bytes();
    assert!(bytes.len() <= before);

    let _ = provider.consume_random_string();
    let _ = provider.consume_date();

    let sublist = provider.consume_sublist(&ITEMS);
    assert!(!sublist.is_empty() && sublist.len() <= ITEMS.len());
    assert!(sublist.iter().all(|v| ITEMS.contains(v)));

    let options = ScratchOptions {
        all_data: provider.consume_bool(),
        as_bytes: provider.consume_bool(),
    };
    provider.with_memory_file(options, |file| {
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).expect("memory file read");
    });

    if let Ok(scratch) = provider.consume_temporary_file(".fuzz", options) {
        assert!(scratch.path().exists());
    }

    let _ = provider.consume_remaining_bytes();
    assert_eq!(provider.remaining_bytes(), 0);
});
