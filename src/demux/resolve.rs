use super::average::CounterValues;
use crate::window::CounterId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregation scope, ordered from most to least specific
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// The exact sample taken in the window
    Window,
    /// Mean over the window's phase instance
    #[default]
    Instance,
    /// Mean over every instance of the window's phase
    Phase,
    /// Mean over the whole trace
    Program,
}

impl Level {
    /// All levels, most specific first
    pub const ALL: [Level; 4] = [Level::Window, Level::Instance, Level::Phase, Level::Program];
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Window => "window",
            Level::Instance => "instance",
            Level::Phase => "phase",
            Level::Program => "program",
        };
        f.write_str(name)
    }
}

/// A demultiplexed counter value tagged with the scope that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    pub value: f64,
    pub level: Level,
}

/// The four scopes a window's counter can be resolved from
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScopeChain<'a> {
    pub(crate) window: &'a CounterValues,
    pub(crate) instance: &'a CounterValues,
    pub(crate) phase: &'a CounterValues,
    pub(crate) program: &'a CounterValues,
}

impl<'a> ScopeChain<'a> {
    /// Most specific scope at or above `requested` that holds `counter`
    ///
    /// Scopes finer than `requested` are skipped even when they hold a value;
    /// `Program` is always consulted.
    pub(crate) fn resolve(&self, counter: CounterId, requested: Level) -> Option<Resolved> {
        let scopes = [
            (Level::Window, self.window),
            (Level::Instance, self.instance),
            (Level::Phase, self.phase),
            (Level::Program, self.program),
        ];

        scopes
            .into_iter()
            .filter(|(level, _)| *level >= requested)
            .find_map(|(level, values)| values.get(counter).map(|value| Resolved { value, level }))
    }
}
