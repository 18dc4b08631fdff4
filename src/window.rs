//! Window records and file headers
//!
//! A trace is a sequence of fixed-granularity execution windows. Every window
//! carries the phase it was classified into, the signature vector the
//! classifier used, and a sparse set of hardware counter samples. Only a few
//! counters can be measured concurrently, so different windows sample
//! different counter subsets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Phase identifier assigned by the classifier
pub type PhaseId = u32;

/// Hardware performance counter identifier
pub type CounterId = u32;

/// First frame of every data file
///
/// The UUID binds the data file to the profile manifest describing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub uuid: Uuid,

    /// Free-form producer settings (sample period, window size, ...)
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Header {
    /// Create a header with no settings
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            settings: BTreeMap::new(),
        }
    }

    /// Attach a producer setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Classification of a single window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PhaseInfo {
    /// Phase the window was classified into
    pub phase: PhaseId,

    /// Behavioral feature vector used for classification
    pub signature: Vec<f64>,

    /// Phase predicted for the next window, if the producer ran a predictor
    #[serde(default)]
    pub prediction: Option<PhaseId>,
}

/// One hardware counter sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PerfSample {
    pub counter_id: CounterId,
    pub value: f64,
}

/// Instruction address histogram entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeSample {
    pub address: u64,
    pub count: u64,
}

/// The atomic unit appended to a data file
///
/// Windows are immutable once written. Reclassification produces a new file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowRecord {
    pub phase: PhaseInfo,

    /// Sparse counter samples; may be empty
    #[serde(default)]
    pub perf_samples: Vec<PerfSample>,

    /// Number of execution units (instructions) the window spans
    pub size: u64,

    #[serde(default)]
    pub code_samples: Vec<CodeSample>,
}

impl WindowRecord {
    /// Create a window with a phase and no samples
    pub fn new(phase: PhaseId, size: u64) -> Self {
        Self {
            phase: PhaseInfo {
                phase,
                ..PhaseInfo::default()
            },
            size,
            ..Self::default()
        }
    }

    /// Set the signature vector
    pub fn with_signature(mut self, signature: Vec<f64>) -> Self {
        self.phase.signature = signature;
        self
    }

    /// Append a counter sample
    pub fn with_sample(mut self, counter_id: CounterId, value: f64) -> Self {
        self.perf_samples.push(PerfSample { counter_id, value });
        self
    }

    /// Append an instruction address sample
    pub fn with_code_sample(mut self, address: u64, count: u64) -> Self {
        self.code_samples.push(CodeSample { address, count });
        self
    }

    /// Phase id of this window
    pub fn phase_id(&self) -> PhaseId {
        self.phase.phase
    }
}
