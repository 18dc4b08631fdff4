// Unit tests for the window log store
//
// Files are built in memory and read back through `Cursor`, so these tests
// exercise the same frame codec and offset index as the file-backed reader.

use super::*;
use crate::window::{Header, WindowRecord};
use std::io::{Cursor, Read, Seek, SeekFrom};
use uuid::Uuid;

fn sample_windows(n: usize) -> Vec<WindowRecord> {
    (0..n)
        .map(|i| {
            // Vary payload sizes so offsets are not arithmetic
            let mut window = WindowRecord::new((i % 3) as u32, 1000 + i as u64)
                .with_signature(vec![i as f64; i % 4 + 1]);
            for c in 0..(i % 5) {
                window = window.with_sample(c as u32, (i * 10 + c) as f64);
            }
            window
        })
        .collect()
}

fn encode(uuid: Uuid, windows: &[WindowRecord]) -> Vec<u8> {
    let mut writer = WindowWriter::new(Vec::new(), Header::new(uuid)).unwrap();
    for window in windows {
        writer.write(window).unwrap();
    }
    writer.into_inner().unwrap()
}

fn reader_for(windows: &[WindowRecord]) -> WindowReader<Cursor<Vec<u8>>> {
    WindowReader::new(Cursor::new(encode(Uuid::nil(), windows)), None).unwrap()
}

#[test]
fn test_sequential_read_returns_all_windows() {
    let windows = sample_windows(8);
    let mut reader = reader_for(&windows);

    let read: Vec<WindowRecord> = reader.by_ref().map(|w| w.unwrap()).collect();
    assert_eq!(read, windows);
    assert!(reader.is_eof());
    assert_eq!(reader.tell(), 8);
}

#[test]
fn test_end_of_sequence_is_repeatable() {
    let mut reader = reader_for(&sample_windows(2));
    reader.next_window().unwrap();
    reader.next_window().unwrap();

    assert!(reader.next_window().unwrap().is_none());
    assert!(reader.next_window().unwrap().is_none());
    assert_eq!(reader.tell(), 2);
}

#[test]
fn test_header_roundtrip() {
    let uuid = Uuid::new_v4();
    let header = Header::new(uuid).with_setting("sample_period", "100000");
    let mut writer = WindowWriter::new(Vec::new(), header.clone()).unwrap();
    writer.write(&WindowRecord::new(0, 1)).unwrap();
    assert_eq!(writer.windows_written(), 1);

    let bytes = writer.into_inner().unwrap();
    let reader = WindowReader::new(Cursor::new(bytes), Some(uuid)).unwrap();
    assert_eq!(reader.header(), &header);
}

#[test]
fn test_uuid_mismatch_rejected() {
    let bytes = encode(Uuid::new_v4(), &sample_windows(3));
    let other = Uuid::new_v4();

    let err = WindowReader::new(Cursor::new(bytes), Some(other)).unwrap_err();
    assert!(matches!(err, StoreError::UuidMismatch { expected, .. } if expected == other));
}

#[test]
fn test_missing_header_is_eof_error() {
    let err = WindowReader::new(Cursor::new(vec![0u8, 1]), None).unwrap_err();
    assert!(matches!(err, StoreError::MissingHeader));
}

#[test]
fn test_garbage_header_is_format_error() {
    let mut bytes = 3i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0xc1, 0xc1, 0xc1]);

    let err = WindowReader::new(Cursor::new(bytes), None).unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)));
}

#[test]
fn test_empty_file_has_no_windows() {
    let mut reader = reader_for(&[]);
    assert!(reader.next_window().unwrap().is_none());
    assert_eq!(reader.window_count().unwrap(), 0);
    assert!(matches!(
        reader.seek(WindowSeek::End(0)),
        Err(StoreError::OutOfRange(-1))
    ));
}

#[test]
fn test_seek_matches_sequential_order() {
    let windows = sample_windows(10);
    let mut reader = reader_for(&windows);

    // Mix skip-scans and index hits
    for k in [7, 2, 9, 0, 5, 5, 8, 1] {
        assert_eq!(reader.seek(WindowSeek::Start(k)).unwrap(), k);
        assert_eq!(reader.next_window().unwrap().unwrap(), windows[k]);
        assert_eq!(reader.tell(), k + 1);
    }
}

#[test]
fn test_index_grows_lazily() {
    let mut reader = reader_for(&sample_windows(10));
    assert_eq!(reader.indexed_windows(), 0);

    reader.seek(WindowSeek::Start(4)).unwrap();
    assert_eq!(reader.indexed_windows(), 4);

    reader.seek(WindowSeek::Start(1)).unwrap();
    assert_eq!(reader.indexed_windows(), 4);

    assert_eq!(reader.window_count().unwrap(), 10);
    assert_eq!(reader.indexed_windows(), 10);
    assert_eq!(reader.tell(), 1);
}

#[test]
fn test_get_does_not_move_cursor() {
    let windows = sample_windows(6);
    let mut reader = reader_for(&windows);

    for j in 0..windows.len() {
        reader.seek(WindowSeek::Start(j)).unwrap();
        for (i, expected) in windows.iter().enumerate() {
            assert_eq!(&reader.get(i).unwrap(), expected);
            assert_eq!(reader.tell(), j);
        }
        assert_eq!(reader.next_window().unwrap().unwrap(), windows[j]);
    }
}

#[test]
fn test_get_out_of_range_keeps_cursor() {
    let windows = sample_windows(4);
    let mut reader = reader_for(&windows);
    reader.next_window().unwrap();

    assert!(matches!(reader.get(4), Err(StoreError::OutOfRange(4))));
    assert!(matches!(reader.get(9), Err(StoreError::OutOfRange(9))));
    assert_eq!(reader.tell(), 1);
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[1]);
}

#[test]
fn test_seek_end_relative() {
    let windows = sample_windows(5);
    let mut reader = reader_for(&windows);

    assert_eq!(reader.seek(WindowSeek::End(0)).unwrap(), 4);
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[4]);
    assert!(reader.next_window().unwrap().is_none());

    assert_eq!(reader.seek(WindowSeek::End(-1)).unwrap(), 3);
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[3]);

    assert!(matches!(
        reader.seek(WindowSeek::End(1)),
        Err(StoreError::OutOfRange(5))
    ));
    assert!(matches!(
        reader.seek(WindowSeek::End(-5)),
        Err(StoreError::OutOfRange(-1))
    ));
}

#[test]
fn test_seek_current_relative() {
    let windows = sample_windows(6);
    let mut reader = reader_for(&windows);

    assert_eq!(reader.seek(WindowSeek::Current(3)).unwrap(), 3);
    assert_eq!(reader.seek(WindowSeek::Current(-2)).unwrap(), 1);
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[1]);

    assert!(reader.seek(WindowSeek::Current(-3)).is_err());
    assert_eq!(reader.tell(), 2);
}

#[test]
fn test_seek_past_end_fails_without_moving() {
    let windows = sample_windows(3);
    let mut reader = reader_for(&windows);
    reader.next_window().unwrap();

    // One past the last window is a valid position
    assert_eq!(reader.seek(WindowSeek::Start(3)).unwrap(), 3);
    assert!(reader.next_window().unwrap().is_none());

    reader.seek(WindowSeek::Start(1)).unwrap();
    assert!(matches!(
        reader.seek(WindowSeek::Start(4)),
        Err(StoreError::OutOfRange(4))
    ));
    assert_eq!(reader.tell(), 1);
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[1]);
}

#[test]
fn test_rewind_after_eof() {
    let windows = sample_windows(3);
    let mut reader = reader_for(&windows);
    while reader.next_window().unwrap().is_some() {}

    reader.rewind().unwrap();
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[0]);
}

#[test]
fn test_truncated_trailing_frame() {
    let windows = sample_windows(3);
    let mut bytes = encode(Uuid::nil(), &windows);
    // Declare a 64 byte payload but provide only 2 bytes of it
    bytes.extend_from_slice(&64i32.to_le_bytes());
    bytes.extend_from_slice(&[0x90, 0x90]);

    let mut reader = WindowReader::new(Cursor::new(bytes), None).unwrap();
    for expected in &windows {
        assert_eq!(&reader.next_window().unwrap().unwrap(), expected);
    }
    assert!(matches!(
        reader.next_window(),
        Err(StoreError::MalformedFrame { .. })
    ));
}

#[test]
fn test_negative_length_prefix() {
    let mut bytes = encode(Uuid::nil(), &[]);
    bytes.extend_from_slice(&(-1i32).to_le_bytes());

    let mut reader = WindowReader::new(Cursor::new(bytes), None).unwrap();
    assert!(matches!(
        reader.next_window(),
        Err(StoreError::MalformedFrame { .. })
    ));
}

/// Records every seek issued against the wrapped stream
struct SeekLog<R> {
    inner: R,
    seeks: Vec<SeekFrom>,
}

impl<R: Read> Read for SeekLog<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for SeekLog<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.seeks.push(pos);
        self.inner.seek(pos)
    }
}

fn logged_reader(windows: &[WindowRecord]) -> WindowReader<SeekLog<Cursor<Vec<u8>>>> {
    let log = SeekLog {
        inner: Cursor::new(encode(Uuid::nil(), windows)),
        seeks: Vec::new(),
    };
    WindowReader::new(log, None).unwrap()
}

#[test]
fn test_skip_scan_never_queries_position() {
    let windows = sample_windows(40);
    let mut reader = logged_reader(&windows);
    reader.inner.seeks.clear();

    assert_eq!(reader.window_count().unwrap(), 40);
    for i in [39, 0, 17, 17, 5] {
        assert_eq!(reader.get(i).unwrap(), windows[i]);
    }

    // Only relative moves: no absolute seeks, no position queries
    let seeks = &reader.inner.seeks;
    assert!(!seeks.is_empty());
    assert!(seeks
        .iter()
        .all(|pos| matches!(pos, SeekFrom::Current(delta) if *delta != 0)));
}

#[test]
fn test_sequential_read_does_not_seek() {
    let windows = sample_windows(10);
    let mut reader = logged_reader(&windows);
    reader.inner.seeks.clear();

    for expected in &windows {
        assert_eq!(&reader.next_window().unwrap().unwrap(), expected);
    }
    assert!(reader.inner.seeks.is_empty());
}

#[test]
fn test_reader_recovers_after_malformed_payload() {
    let windows = sample_windows(3);
    let mut bytes = encode(Uuid::nil(), &windows);
    bytes.extend_from_slice(&64i32.to_le_bytes());
    bytes.extend_from_slice(&[0x90, 0x90]);

    let mut reader = WindowReader::new(Cursor::new(bytes), None).unwrap();
    assert_eq!(reader.by_ref().take(3).count(), 3);
    assert!(reader.next_window().is_err());

    // Tracked offsets stay valid for random access afterwards
    reader.rewind().unwrap();
    assert_eq!(reader.next_window().unwrap().unwrap(), windows[0]);
    assert_eq!(reader.get(2).unwrap(), windows[2]);
}
