//! Phaselog - windowed performance-counter traces with phase-guided demultiplexing
//!
//! This library stores execution traces as append-only, length-framed logs of
//! fixed-granularity windows, and reconstructs a dense per-window value for any
//! hardware counter from sparse, multiplexed samples using the phase hierarchy
//! of the trace.

pub mod config;
pub mod demux;
pub mod profile;
pub mod refine;
pub mod simpoint;
pub mod store;
pub mod window;
