use crate::window::CounterId;
use std::collections::HashMap;

/// Counter values for one scope (a window's samples, or a scope's means)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterValues(HashMap<CounterId, f64>);

impl CounterValues {
    /// Value recorded for `counter`, if any
    pub fn get(&self, counter: CounterId) -> Option<f64> {
        self.0.get(&counter).copied()
    }

    pub fn contains(&self, counter: CounterId) -> bool {
        self.0.contains_key(&counter)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(counter, value)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (CounterId, f64)> + '_ {
        self.0.iter().map(|(&counter, &value)| (counter, value))
    }
}

/// Later pairs overwrite earlier ones with the same counter id
impl FromIterator<(CounterId, f64)> for CounterValues {
    fn from_iter<I: IntoIterator<Item = (CounterId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Running `(sum, count)` per counter
///
/// Accumulation and finalization are separate steps: samples are added while
/// the hierarchy is walked, then [`RunningAverage::finish`] turns every pair
/// into a mean once.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunningAverage {
    sums: HashMap<CounterId, (f64, u64)>,
}

impl RunningAverage {
    pub(crate) fn add(&mut self, counter: CounterId, value: f64) {
        let entry = self.sums.entry(counter).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    pub(crate) fn finish(self) -> CounterValues {
        self.sums
            .into_iter()
            .map(|(counter, (sum, count))| (counter, sum / count as f64))
            .collect()
    }
}
