//! Simulation point selection
//!
//! Picks one representative window per phase so that simulating only those
//! windows, weighted by phase size, approximates the whole trace. Phases are
//! taken largest first until the requested share of windows is covered.
//!
//! Two selection rules are supported:
//! - [`Selection::Center`]: the window whose signature is closest (cityblock
//!   distance) to the phase centroid
//! - [`Selection::First`]: the first window of the phase

use crate::config::SimpointSettings;
use crate::profile::ThreadProfile;
use crate::store::{StoreError, WindowReader};
use crate::window::PhaseId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek};
use thiserror::Error;

/// Errors for simulation point selection
#[derive(Error, Debug)]
pub enum SimpointError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Coverage must be between 0 and 100 percent, got {0}")]
    InvalidCoverage(f64),

    #[error("Window {index} of phase {phase} has a signature of length {found}, expected {expected}")]
    SignatureLength {
        index: usize,
        phase: PhaseId,
        expected: usize,
        found: usize,
    },
}

pub type Result<T> = std::result::Result<T, SimpointError>;

/// How the representative window of a phase is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Closest to the phase centroid
    #[default]
    Center,
    /// First window of the phase
    First,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Center => write!(f, "center"),
            Selection::First => write!(f, "first"),
        }
    }
}

/// One simulation point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimPoint {
    pub pid: PhaseId,
    /// Execution units before the window starts
    pub offset: u64,
    /// Size of the window
    pub duration: u64,
    /// Number of windows in the phase
    pub weight: usize,
}

/// Running state of one phase across both passes
#[derive(Debug)]
struct PhaseSummary {
    pid: PhaseId,
    windows: usize,
    centroid: Vec<f64>,
    best: SimPoint,
    distance: f64,
}

/// Select simulation points covering at least `coverage` percent of windows
///
/// The reader is rewound first. Points come back in trace order. An empty
/// trace yields no points.
pub fn find_simpoints<R: Read + Seek>(
    reader: &mut WindowReader<R>,
    coverage: f64,
    selection: Selection,
) -> Result<Vec<SimPoint>> {
    if !(0.0..=100.0).contains(&coverage) {
        return Err(SimpointError::InvalidCoverage(coverage));
    }

    let mut phases = summarize(reader)?;
    if selection == Selection::Center {
        pick_centers(reader, &mut phases)?;
    }

    let total: usize = phases.iter().map(|p| p.windows).sum();
    let threshold = coverage / 100.0 * total as f64;

    // Stable sort: equal sizes keep order of first appearance
    phases.sort_by(|a, b| b.windows.cmp(&a.windows));

    let mut covered = 0;
    let mut points = Vec::new();
    for phase in &phases {
        covered += phase.windows;
        points.push(phase.best);
        if covered as f64 > threshold {
            break;
        }
    }
    points.sort_by_key(|p| p.offset);

    tracing::debug!(
        %selection,
        coverage,
        phases = phases.len(),
        points = points.len(),
        "selected simulation points"
    );
    Ok(points)
}

/// Select simulation points for one thread of a profile
pub fn find_for_thread(
    thread: &ThreadProfile,
    settings: &SimpointSettings,
) -> anyhow::Result<Vec<SimPoint>> {
    use anyhow::Context;

    let mut reader = thread.open_reader().with_context(|| {
        format!("Failed to open data file: {}", thread.data_file.display())
    })?;
    Ok(find_simpoints(&mut reader, settings.coverage, settings.selection)?)
}

/// First pass: window counts, signature sums and first windows per phase
fn summarize<R: Read + Seek>(reader: &mut WindowReader<R>) -> Result<Vec<PhaseSummary>> {
    reader.rewind()?;

    let mut slots: HashMap<PhaseId, usize> = HashMap::new();
    let mut phases: Vec<PhaseSummary> = Vec::new();
    let mut offset = 0u64;
    let mut index = 0usize;

    while let Some(window) = reader.next_window()? {
        let pid = window.phase_id();
        let signature = &window.phase.signature;

        let slot = *slots.entry(pid).or_insert_with(|| {
            phases.push(PhaseSummary {
                pid,
                windows: 0,
                centroid: vec![0.0; signature.len()],
                best: SimPoint {
                    pid,
                    offset,
                    duration: window.size,
                    weight: 0,
                },
                distance: f64::INFINITY,
            });
            phases.len() - 1
        });

        let phase = &mut phases[slot];
        if signature.len() != phase.centroid.len() {
            return Err(SimpointError::SignatureLength {
                index,
                phase: pid,
                expected: phase.centroid.len(),
                found: signature.len(),
            });
        }
        for (sum, x) in phase.centroid.iter_mut().zip(signature) {
            *sum += x;
        }
        phase.windows += 1;
        phase.best.weight = phase.windows;

        offset += window.size;
        index += 1;
    }

    for phase in &mut phases {
        let n = phase.windows as f64;
        phase.centroid.iter_mut().for_each(|x| *x /= n);
    }
    Ok(phases)
}

/// Second pass: the window nearest each centroid, earliest on ties
fn pick_centers<R: Read + Seek>(
    reader: &mut WindowReader<R>,
    phases: &mut [PhaseSummary],
) -> Result<()> {
    reader.rewind()?;

    let slots: HashMap<PhaseId, usize> = phases
        .iter()
        .enumerate()
        .map(|(slot, p)| (p.pid, slot))
        .collect();
    let mut offset = 0u64;

    while let Some(window) = reader.next_window()? {
        if let Some(&slot) = slots.get(&window.phase_id()) {
            let phase = &mut phases[slot];
            let distance = cityblock(&phase.centroid, &window.phase.signature);
            if distance < phase.distance {
                phase.distance = distance;
                phase.best.offset = offset;
                phase.best.duration = window.size;
            }
        }
        offset += window.size;
    }
    Ok(())
}

fn cityblock(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}
