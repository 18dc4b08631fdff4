#![no_main]

use libfuzzer_sys::fuzz_target;
use phaselog::store::{WindowReader, WindowSeek};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics
    let Ok(mut reader) = WindowReader::new(Cursor::new(data), None) else {
        return;
    };

    let mut decoded = 0usize;
    while let Ok(Some(_)) = reader.next_window() {
        decoded += 1;
    }

    if let Ok(count) = reader.window_count() {
        assert!(count >= decoded);
        let _ = reader.seek(WindowSeek::End(0));
        let _ = reader.seek(WindowSeek::Current(-1));
        let _ = reader.get(count / 2);
    }
});
