use super::error::Result;
use super::frame;
use crate::window::{Header, WindowRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

/// Append-only writer for window data files
///
/// The header frame is written and flushed on creation. Windows are appended
/// in call order; the format stores no window index, so ordering is the
/// caller's responsibility. There is no trailer.
///
/// # Example
///
/// ```no_run
/// use phaselog::store::WindowWriter;
/// use phaselog::window::WindowRecord;
/// use uuid::Uuid;
///
/// # fn main() -> phaselog::store::Result<()> {
/// let mut writer = WindowWriter::create("thread-0.dat", Uuid::new_v4())?;
/// writer.write(&WindowRecord::new(0, 100_000).with_sample(1, 4711.0))?;
/// writer.flush()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WindowWriter<W: Write = BufWriter<File>> {
    inner: W,
    header: Header,
    windows_written: usize,
}

impl WindowWriter<BufWriter<File>> {
    /// Create (or truncate) `path` and write the header frame
    pub fn create(path: impl AsRef<Path>, uuid: Uuid) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), %uuid, "created window data file");
        Self::new(BufWriter::new(file), Header::new(uuid))
    }
}

impl<W: Write> WindowWriter<W> {
    /// Wrap an existing sink, writing and flushing `header` immediately
    pub fn new(mut inner: W, header: Header) -> Result<Self> {
        frame::write_frame(&mut inner, &header)?;
        inner.flush()?;

        Ok(Self {
            inner,
            header,
            windows_written: 0,
        })
    }

    /// Append one window frame
    pub fn write(&mut self, window: &WindowRecord) -> Result<()> {
        frame::write_frame(&mut self.inner, window)?;
        self.windows_written += 1;
        Ok(())
    }

    /// Flush buffered frames to the sink
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Header written at creation
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of windows appended so far
    pub fn windows_written(&self) -> usize {
        self.windows_written
    }

    /// Flush and return the underlying sink
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
