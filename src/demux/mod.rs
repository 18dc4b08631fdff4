//! Phase-guided counter demultiplexing
//!
//! Hardware counters are multiplexed across windows, so most (window, counter)
//! pairs have no direct sample. The demultiplexer builds a
//! phase → instance → window hierarchy over a trace and answers every query
//! from the narrowest scope that sampled the counter:
//!
//! ```text
//! Window > Instance > Phase > Program
//! ```
//!
//! # Example
//!
//! ```no_run
//! use phaselog::demux::{Demultiplexer, Level};
//! use phaselog::store::WindowReader;
//!
//! # fn main() -> phaselog::demux::Result<()> {
//! let mut reader = WindowReader::open("thread-0.dat", None)?;
//! let demux = Demultiplexer::build(&mut reader)?;
//!
//! for window in demux.read() {
//!     let cycles = window.value(0)?;
//!     println!("{} {} {} ({})", window.index(), window.phase(), cycles.value, cycles.level);
//! }
//!
//! let smoothed = demux.demultiplex(0, 0, Level::Program)?;
//! # Ok(())
//! # }
//! ```

mod average;
mod error;
mod hierarchy;
mod resolve;

pub use average::CounterValues;
pub use error::{DemuxError, Result};
pub use hierarchy::{Instance, Phase};
pub use resolve::{Level, Resolved};

use crate::store::WindowReader;
use crate::window::{CounterId, PhaseId};
use average::RunningAverage;
use hierarchy::Hierarchy;
use resolve::ScopeChain;
use std::io::{Read, Seek};

/// Dense counter lookups over a sparse trace
///
/// Built once from a reader; averages are frozen afterwards. Call
/// [`Demultiplexer::rebuild`] to re-read the trace.
#[derive(Debug, Clone)]
pub struct Demultiplexer {
    phase_list: Vec<PhaseId>,
    hierarchy: Hierarchy,
    /// Resolved samples per window index
    samples: Vec<CounterValues>,
    program: CounterValues,
    default_level: Level,
}

impl Demultiplexer {
    /// Scan `reader` and build the hierarchy with its running averages
    ///
    /// The reader is rewound first and left at the end of the trace. Every
    /// window is read once sequentially for its phase id and once more by
    /// index for its samples.
    pub fn build<R: Read + Seek>(reader: &mut WindowReader<R>) -> Result<Self> {
        let phase_list = scan_phases(reader)?;
        let mut hierarchy = Hierarchy::from_phase_list(&phase_list);

        let mut samples = vec![CounterValues::default(); phase_list.len()];
        let mut instance_acc = vec![RunningAverage::default(); hierarchy.instances.len()];
        let mut phase_acc = vec![RunningAverage::default(); hierarchy.phases.len()];
        let mut program_acc = RunningAverage::default();

        for (slot, phase) in hierarchy.phases.iter().enumerate() {
            for &id in phase.instance_ids() {
                for index in hierarchy.instances[id].windows() {
                    let window = reader.get(index)?;

                    // Every sample counts towards the means, repeats included
                    for sample in &window.perf_samples {
                        instance_acc[id].add(sample.counter_id, sample.value);
                        phase_acc[slot].add(sample.counter_id, sample.value);
                        program_acc.add(sample.counter_id, sample.value);
                    }
                    samples[index] = window
                        .perf_samples
                        .iter()
                        .map(|s| (s.counter_id, s.value))
                        .collect();
                }
            }
        }

        for (instance, acc) in hierarchy.instances.iter_mut().zip(instance_acc) {
            instance.averages = acc.finish();
        }
        for (phase, acc) in hierarchy.phases.iter_mut().zip(phase_acc) {
            phase.averages = acc.finish();
        }
        let program = program_acc.finish();

        tracing::debug!(
            windows = phase_list.len(),
            phases = hierarchy.phases.len(),
            instances = hierarchy.instances.len(),
            counters = program.len(),
            "built phase hierarchy"
        );

        Ok(Self {
            phase_list,
            hierarchy,
            samples,
            program,
            default_level: Level::default(),
        })
    }

    /// Discard all derived data and build again from `reader`
    pub fn rebuild<R: Read + Seek>(&mut self, reader: &mut WindowReader<R>) -> Result<()> {
        let default_level = self.default_level;
        *self = Self::build(reader)?;
        self.default_level = default_level;
        Ok(())
    }

    /// Level used by [`DemuxWindow::value`]; `Instance` unless changed
    pub fn with_default_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn default_level(&self) -> Level {
        self.default_level
    }

    /// Number of windows in the trace
    pub fn len(&self) -> usize {
        self.phase_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase_list.is_empty()
    }

    /// Phase id of every window, in program order
    pub fn phase_list(&self) -> &[PhaseId] {
        &self.phase_list
    }

    pub fn phase_of(&self, index: usize) -> Option<PhaseId> {
        self.phase_list.get(index).copied()
    }

    /// Phases in order of first appearance
    pub fn phases(&self) -> &[Phase] {
        &self.hierarchy.phases
    }

    pub fn phase(&self, pid: PhaseId) -> Option<&Phase> {
        let slot = self.hierarchy.phase_slot(pid)?;
        self.hierarchy.phases.get(slot)
    }

    /// Instance by arena id (see [`Phase::instance_ids`])
    pub fn instance(&self, id: usize) -> Option<&Instance> {
        self.hierarchy.instances.get(id)
    }

    /// Instances of `pid` in program order
    pub fn instances_of(&self, pid: PhaseId) -> impl Iterator<Item = &Instance> + '_ {
        self.phase(pid)
            .map(Phase::instance_ids)
            .unwrap_or_default()
            .iter()
            .map(|&id| &self.hierarchy.instances[id])
    }

    /// Samples taken directly in window `index`
    pub fn window_samples(&self, index: usize) -> Option<&CounterValues> {
        self.samples.get(index)
    }

    /// Means over the whole trace
    pub fn program_averages(&self) -> &CounterValues {
        &self.program
    }

    /// Best available value of `counter` at window `index`
    ///
    /// Only scopes at or above `level` are considered; among those the most
    /// specific one holding the counter wins.
    pub fn demultiplex(&self, index: usize, counter: CounterId, level: Level) -> Result<Resolved> {
        self.scopes(index)?
            .resolve(counter, level)
            .ok_or(DemuxError::CounterNeverSampled { counter, index })
    }

    /// Per-window view of the trace; call again to restart
    pub fn read(&self) -> Windows<'_> {
        Windows {
            demux: self,
            next: 0,
        }
    }

    fn scopes(&self, index: usize) -> Result<ScopeChain<'_>> {
        let phase = self
            .phase_of(index)
            .ok_or(DemuxError::WindowOutOfRange {
                index,
                len: self.len(),
            })?;
        let inconsistent = || DemuxError::Inconsistent { index, phase };

        let slot = self.hierarchy.phase_slot(phase).ok_or_else(inconsistent)?;
        let instance = self
            .hierarchy
            .locate(slot, index)
            .ok_or_else(inconsistent)?;

        Ok(ScopeChain {
            window: &self.samples[index],
            instance: &self.hierarchy.instances[instance].averages,
            phase: &self.hierarchy.phases[slot].averages,
            program: &self.program,
        })
    }
}

/// Iterator over [`DemuxWindow`]s in program order
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    demux: &'a Demultiplexer,
    next: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = DemuxWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let phase = self.demux.phase_of(self.next)?;
        let window = DemuxWindow {
            demux: self.demux,
            index: self.next,
            phase,
        };
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.demux.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

/// One window of a demultiplexed trace
#[derive(Debug, Clone, Copy)]
pub struct DemuxWindow<'a> {
    demux: &'a Demultiplexer,
    index: usize,
    phase: PhaseId,
}

impl DemuxWindow<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    /// Counter value at the demultiplexer's default level
    pub fn value(&self, counter: CounterId) -> Result<Resolved> {
        self.value_at(counter, self.demux.default_level)
    }

    pub fn value_at(&self, counter: CounterId, level: Level) -> Result<Resolved> {
        self.demux.demultiplex(self.index, counter, level)
    }
}

fn scan_phases<R: Read + Seek>(reader: &mut WindowReader<R>) -> Result<Vec<PhaseId>> {
    reader.rewind()?;

    let mut phase_list = Vec::new();
    while let Some(window) = reader.next_window()? {
        phase_list.push(window.phase_id());
    }
    Ok(phase_list)
}
