//! Settings for demultiplexing, refining and simulation point selection
//!
//! # Example TOML
//! ```toml
//! [demux]
//! default_level = "instance"
//!
//! [refine]
//! clusters = 8
//! max_iterations = 50
//! temp_suffix = ".refine"
//! output = "refined/profile.toml"
//!
//! [simpoint]
//! coverage = 90.0
//! selection = "first"
//! ```

use crate::demux::Level;
use crate::simpoint::Selection;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaselogConfig {
    pub demux: DemuxSettings,
    pub refine: RefineSettings,
    pub simpoint: SimpointSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxSettings {
    /// Level used when enumerating windows; `instance` by default
    pub default_level: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSettings {
    /// Number of phases to reclassify into
    ///
    /// Default: the number of distinct phases already in the trace
    pub clusters: Option<usize>,

    /// Upper bound on clustering iterations
    pub max_iterations: usize,

    /// Suffix of the sibling file refined windows are written to before it
    /// replaces the original
    pub temp_suffix: String,

    /// Write the refined profile here instead of over the input
    ///
    /// Each thread's data then goes to `<output><tid>`.
    pub output: Option<PathBuf>,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            clusters: None,
            max_iterations: 20,
            temp_suffix: "_".to_string(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpointSettings {
    /// Percentage of windows the selected phases must cover
    pub coverage: f64,

    /// Representative window of each phase
    pub selection: Selection,
}

impl Default for SimpointSettings {
    fn default() -> Self {
        Self {
            coverage: 80.0,
            selection: Selection::Center,
        }
    }
}

impl PhaselogConfig {
    /// Load settings from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::parse(&content)
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.refine.clusters == Some(0) {
            return Err("refine.clusters must be at least 1".to_string());
        }

        if self.refine.max_iterations == 0 {
            return Err("refine.max_iterations must be at least 1".to_string());
        }

        if self.refine.temp_suffix.is_empty() {
            return Err("refine.temp_suffix must not be empty".to_string());
        }

        if !(0.0..=100.0).contains(&self.simpoint.coverage) {
            return Err(format!(
                "simpoint.coverage must be between 0 and 100, got {}",
                self.simpoint.coverage
            ));
        }

        Ok(())
    }
}
