use super::error::{Result, StoreError};
use super::frame::{self, Prefix, PREFIX_LEN};
use crate::window::{Header, WindowRecord};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use uuid::Uuid;

/// Cursor movement for [`WindowReader::seek`], in window units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSeek {
    /// Absolute window index
    Start(usize),
    /// Relative to the current cursor
    Current(i64),
    /// Relative to the last window; only zero or negative offsets are valid
    End(i64),
}

/// Saved cursor state: window position plus byte offset
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    position: usize,
    offset: u64,
}

/// Randomly seekable reader for window data files
///
/// Window payloads vary in size, so offsets cannot be computed. The reader
/// keeps a lazy offset index (window index to byte offset of its length
/// prefix) that grows as frames are scanned and is never invalidated.
/// Skip-scanning reads only the length prefix and seeks past the payload.
///
/// The byte offset of `inner` is tracked alongside the cursor, so scanning
/// never queries the stream position and every move is a relative seek
/// (which a `BufReader` serves from its buffer when it can).
///
/// # Example
///
/// ```no_run
/// use phaselog::store::{WindowReader, WindowSeek};
///
/// # fn main() -> phaselog::store::Result<()> {
/// let mut reader = WindowReader::open("thread-0.dat", None)?;
/// while let Some(window) = reader.next_window()? {
///     println!("phase {}", window.phase_id());
/// }
///
/// reader.seek(WindowSeek::End(0))?;
/// let last = reader.next_window()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WindowReader<R: Read + Seek = BufReader<File>> {
    pub(super) inner: R,
    header: Header,
    /// Byte offset of the first window frame
    data_start: u64,
    offsets: Vec<u64>,
    position: usize,
    /// Byte offset of `inner`
    offset: u64,
    eof: bool,
}

impl WindowReader<BufReader<File>> {
    /// Open a data file, rejecting it when `uuid` is given and differs from
    /// the header's
    pub fn open(path: impl AsRef<Path>, uuid: Option<Uuid>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = Self::new(BufReader::new(file), uuid)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            uuid = %reader.header.uuid,
            "opened window data file"
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> WindowReader<R> {
    /// Read the header frame from `inner`
    pub fn new(mut inner: R, uuid: Option<Uuid>) -> Result<Self> {
        let start = inner.stream_position()?;
        let Prefix::Frame(len) = frame::read_prefix(&mut inner, start)? else {
            return Err(StoreError::MissingHeader);
        };
        let header: Header = frame::read_payload(&mut inner, len, start)?;

        if let Some(expected) = uuid {
            if expected != header.uuid {
                return Err(StoreError::UuidMismatch {
                    expected,
                    found: header.uuid,
                });
            }
        }

        let data_start = inner.stream_position()?;

        Ok(Self {
            inner,
            header,
            data_start,
            offsets: Vec::new(),
            position: 0,
            offset: data_start,
            eof: false,
        })
    }

    /// Header of the data file
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Current cursor position (window index)
    pub fn tell(&self) -> usize {
        self.position
    }

    /// Whether the end of the data has been reached at least once
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of windows whose byte offset is known
    pub fn indexed_windows(&self) -> usize {
        self.offsets.len()
    }

    /// Decode the window at the cursor and advance
    ///
    /// Returns `Ok(None)` at the end of the sequence.
    pub fn next_window(&mut self) -> Result<Option<WindowRecord>> {
        let Some((offset, len)) = self.advance()? else {
            return Ok(None);
        };

        match frame::read_payload(&mut self.inner, len, offset) {
            Ok(window) => {
                self.offset += len as u64;
                Ok(Some(window))
            }
            Err(e) => {
                // Partial payload reads leave the stream somewhere unknown
                self.offset = self.inner.stream_position()?;
                Err(e)
            }
        }
    }

    /// Read the window at `index` without moving the cursor
    pub fn get(&mut self, index: usize) -> Result<WindowRecord> {
        let saved = self.checkpoint();
        let window = self.seek_to(index).and_then(|()| self.next_window());
        self.restore(saved)?;

        window?.ok_or(StoreError::OutOfRange(index as i64))
    }

    /// Reposition the cursor, returning the new window index
    ///
    /// Seeking one past the last window is allowed; further is out of range.
    /// A failed seek leaves the cursor where it was.
    pub fn seek(&mut self, pos: WindowSeek) -> Result<usize> {
        let target = match pos {
            WindowSeek::Start(index) => index,
            WindowSeek::Current(delta) => absolute(self.position as i64, delta)?,
            WindowSeek::End(delta) => {
                let last = self.window_count()? as i64 - 1;
                if delta > 0 {
                    return Err(StoreError::OutOfRange(last.saturating_add(delta)));
                }
                absolute(last, delta)?
            }
        };

        self.seek_to(target)?;
        Ok(self.position)
    }

    /// Move the cursor back to the first window
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(WindowSeek::Start(0)).map(|_| ())
    }

    /// Total number of windows in the file
    ///
    /// Scans to the end once, growing the offset index; the cursor is kept.
    pub fn window_count(&mut self) -> Result<usize> {
        if !self.eof {
            let saved = self.checkpoint();
            let scanned = self.scan_to_end();
            self.restore(saved)?;
            scanned?;
        }
        Ok(self.offsets.len())
    }

    fn seek_to(&mut self, target: usize) -> Result<()> {
        if target == self.position {
            return Ok(());
        }

        if let Some(&offset) = self.offsets.get(target) {
            self.jump(offset)?;
            self.position = target;
            return Ok(());
        }

        let saved = self.checkpoint();
        let outcome = self.scan_to(target);
        if !matches!(outcome, Ok(true)) {
            self.restore(saved)?;
        }

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(StoreError::OutOfRange(target as i64)),
            Err(e) => Err(e),
        }
    }

    /// Skip-scan from the last indexed frame until `target` is reached
    ///
    /// Returns `false` if the file ends first.
    fn scan_to(&mut self, target: usize) -> Result<bool> {
        self.resume_from_index()?;
        tracing::trace!(from = self.position, target, "materializing offset index");

        while self.position < target {
            if !self.skip_frame()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn scan_to_end(&mut self) -> Result<()> {
        self.resume_from_index()?;
        while self.skip_frame()? {}

        tracing::debug!(windows = self.offsets.len(), "indexed data file to end");
        Ok(())
    }

    /// Position at the last indexed frame, or the first frame if none is known
    fn resume_from_index(&mut self) -> Result<()> {
        let (position, offset) = match self.offsets.last() {
            Some(&offset) => (self.offsets.len() - 1, offset),
            None => (0, self.data_start),
        };

        self.jump(offset)?;
        self.position = position;
        Ok(())
    }

    /// Step over one length prefix, recording its offset
    ///
    /// Returns the frame offset and payload length, or `None` at end of file.
    fn advance(&mut self) -> Result<Option<(u64, usize)>> {
        let offset = self.offset;

        match frame::read_prefix(&mut self.inner, offset) {
            Ok(Prefix::Frame(len)) => {
                if self.position == self.offsets.len() {
                    self.offsets.push(offset);
                }
                self.position += 1;
                self.offset = offset + PREFIX_LEN as u64;
                Ok(Some((offset, len)))
            }
            Ok(Prefix::End { partial }) => {
                // Step back over a partial prefix
                if partial > 0 {
                    self.inner.seek_relative(-(partial as i64))?;
                }
                self.eof = true;
                Ok(None)
            }
            Err(e) => {
                self.inner.seek(SeekFrom::Start(offset))?;
                Err(e)
            }
        }
    }

    fn skip_frame(&mut self) -> Result<bool> {
        match self.advance()? {
            Some((_, len)) => {
                self.inner.seek_relative(len as i64)?;
                self.offset += len as u64;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Move the stream to byte `offset` relative to the tracked one
    fn jump(&mut self, offset: u64) -> Result<()> {
        if offset != self.offset {
            self.inner.seek_relative(offset as i64 - self.offset as i64)?;
            self.offset = offset;
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.position,
            offset: self.offset,
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.jump(checkpoint.offset)?;
        self.position = checkpoint.position;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for WindowReader<R> {
    type Item = Result<WindowRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_window().transpose()
    }
}

fn absolute(base: i64, delta: i64) -> Result<usize> {
    let index = base.saturating_add(delta);
    if index < 0 {
        return Err(StoreError::OutOfRange(index));
    }
    Ok(index as usize)
}
