//! Phase → instance → window hierarchy
//!
//! ```text
//! phase 1 ─┬─ instance [0, 2)  ─ windows 0 1
//!          └─ instance [4, 6)  ─ windows 4 5
//! phase 2 ─── instance [2, 4)  ─ windows 2 3
//! phase 3 ─── instance [6, 7)  ─ window  6
//! ```
//!
//! Phases and instances live in flat arenas and refer to each other by index.

use super::average::CounterValues;
use crate::window::PhaseId;
use std::collections::HashMap;
use std::ops::Range;

/// A maximal contiguous run of windows sharing one phase id
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    phase: PhaseId,
    start: usize,
    len: usize,
    pub(super) averages: CounterValues,
}

impl Instance {
    fn new(phase: PhaseId, start: usize) -> Self {
        Self {
            phase,
            start,
            len: 1,
            averages: CounterValues::default(),
        }
    }

    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    /// First window index
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of windows
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; instances hold at least one window
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Window indices `[start, start + len)`
    pub fn windows(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        self.windows().contains(&index)
    }

    /// Mean of every sample taken inside this instance
    pub fn averages(&self) -> &CounterValues {
        &self.averages
    }
}

/// All windows classified into one phase id
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    id: PhaseId,
    /// Instance arena ids, ordered by start index
    instances: Vec<usize>,
    pub(super) averages: CounterValues,
}

impl Phase {
    fn new(id: PhaseId) -> Self {
        Self {
            id,
            instances: Vec::new(),
            averages: CounterValues::default(),
        }
    }

    pub fn id(&self) -> PhaseId {
        self.id
    }

    /// Instance ids in program order
    pub fn instance_ids(&self) -> &[usize] {
        &self.instances
    }

    /// Mean of every sample taken in any instance of this phase
    pub fn averages(&self) -> &CounterValues {
        &self.averages
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Hierarchy {
    /// Phases in order of first appearance
    pub(super) phases: Vec<Phase>,
    /// Instances in program order
    pub(super) instances: Vec<Instance>,
    slots: HashMap<PhaseId, usize>,
}

impl Hierarchy {
    /// Partition a phase sequence into phases and instances
    ///
    /// A new instance starts whenever the phase id differs from the previous
    /// window's, including at window 0.
    pub(crate) fn from_phase_list(phase_list: &[PhaseId]) -> Self {
        let mut hierarchy = Self::default();
        let mut previous = None;

        for (index, &pid) in phase_list.iter().enumerate() {
            if previous == Some(pid) {
                if let Some(current) = hierarchy.instances.last_mut() {
                    current.len += 1;
                }
            } else {
                let phases = &mut hierarchy.phases;
                let slot = *hierarchy.slots.entry(pid).or_insert_with(|| {
                    phases.push(Phase::new(pid));
                    phases.len() - 1
                });

                hierarchy.phases[slot].instances.push(hierarchy.instances.len());
                hierarchy.instances.push(Instance::new(pid, index));
            }
            previous = Some(pid);
        }

        hierarchy
    }

    pub(crate) fn phase_slot(&self, pid: PhaseId) -> Option<usize> {
        self.slots.get(&pid).copied()
    }

    /// Find the instance of phase `slot` whose range holds `index`
    pub(crate) fn locate(&self, slot: usize, index: usize) -> Option<usize> {
        let ids = &self.phases.get(slot)?.instances;
        let after = ids.partition_point(|&id| self.instances[id].start <= index);
        let candidate = *ids.get(after.checked_sub(1)?)?;

        self.instances[candidate]
            .contains(index)
            .then_some(candidate)
    }
}
