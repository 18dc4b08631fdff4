// Shared helpers for integration tests
//
// Writes window data files into a temporary directory.

#![allow(dead_code)]

use phaselog::store::WindowWriter;
use phaselog::window::WindowRecord;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Write `windows` to `dir/name` with `uuid` in the header
pub fn write_trace(dir: &Path, name: &str, uuid: Uuid, windows: &[WindowRecord]) -> PathBuf {
    let path = dir.join(name);
    let mut writer = WindowWriter::create(&path, uuid).unwrap();
    for window in windows {
        writer.write(window).unwrap();
    }
    writer.flush().unwrap();
    path
}

/// Windows of varying size: phase follows `phases`, one or two samples each
pub fn windows_with_phases(phases: &[u32]) -> Vec<WindowRecord> {
    phases
        .iter()
        .enumerate()
        .map(|(i, &phase)| {
            let mut window = WindowRecord::new(phase, 100_000)
                .with_signature(vec![phase as f64, i as f64 / 10.0])
                .with_sample((i % 4) as u32, (i * 3) as f64);
            if i % 3 == 0 {
                window = window.with_code_sample(0x40_0000 + i as u64, 1 + i as u64);
            }
            window
        })
        .collect()
}
