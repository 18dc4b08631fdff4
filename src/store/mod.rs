//! Windowed log store
//!
//! On-disk layout, all integers little-endian:
//!
//! ```text
//! [i32 header_len][header]
//! [i32 window_len][window]   (0..N times)
//! ```
//!
//! Files are written once by a single [`WindowWriter`] and read by any number
//! of independent [`WindowReader`]s, each owning its own cursor and offset
//! index.

mod error;
mod frame;
mod reader;
mod writer;

pub use error::{Result, StoreError};
pub use frame::PREFIX_LEN;
pub use reader::{WindowReader, WindowSeek};
pub use writer::WindowWriter;

#[cfg(test)]
mod tests;
