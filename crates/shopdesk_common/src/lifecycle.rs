//! Lifecycle - typed status enums, transition tables and stamp tables
//!
//! A lifecycle is data: which status a new entity starts in, which
//! `(current, target)` edges are allowed, and which timestamp field gets
//! stamped when a status is entered. The manager only interprets it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Which lifecycle an entity kind follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleId {
    Order,
    Referral,
    Campaign,
}

impl LifecycleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleId::Order => "order",
            LifecycleId::Referral => "referral",
            LifecycleId::Campaign => "campaign",
        }
    }
}

impl fmt::Display for LifecycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display tone of a status value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Gray,
    Warning,
    Info,
    Primary,
    Success,
    Danger,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Gray => "gray",
            Tone::Warning => "warning",
            Tone::Info => "info",
            Tone::Primary => "primary",
            Tone::Success => "success",
            Tone::Danger => "danger",
        }
    }
}

/// A closed status enumeration stored as a string column
pub trait StatusEnum: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Lifecycle this enum belongs to
    const LIFECYCLE: LifecycleId;

    fn as_str(&self) -> &'static str;

    fn parse(s: &str) -> Option<Self>;

    /// Every value, in display order
    fn all() -> &'static [Self];

    fn tone(&self) -> Tone;
}

/// Allowed `(current, target)` edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable<S: StatusEnum> {
    edges: HashMap<S, HashSet<S>>,
}

impl<S: StatusEnum> Default for TransitionTable<S> {
    fn default() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }
}

impl<S: StatusEnum> TransitionTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow a single edge
    pub fn allow(mut self, from: S, to: S) -> Self {
        self.edges.entry(from).or_default().insert(to);
        self
    }

    /// Allow the same target from several sources
    pub fn allow_from(mut self, from: &[S], to: S) -> Self {
        for source in from {
            self.edges.entry(*source).or_default().insert(to);
        }
        self
    }

    pub fn is_allowed(&self, from: S, to: S) -> bool {
        self.edges
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Allowed targets from a state, in the enum's display order
    pub fn targets(&self, from: S) -> Vec<S> {
        match self.edges.get(&from) {
            Some(targets) => S::all()
                .iter()
                .copied()
                .filter(|s| targets.contains(s))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }
}

/// Status entered -> timestamp field to stamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampTable<S: StatusEnum> {
    fields: HashMap<S, String>,
}

impl<S: StatusEnum> Default for StampTable<S> {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }
}

impl<S: StatusEnum> StampTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(mut self, status: S, field: impl Into<String>) -> Self {
        self.fields.insert(status, field.into());
        self
    }

    pub fn field_for(&self, status: S) -> Option<&str> {
        self.fields.get(&status).map(String::as_str)
    }
}

/// Complete lifecycle for one status enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle<S: StatusEnum> {
    pub initial: S,
    pub terminal: Vec<S>,
    pub transitions: TransitionTable<S>,
    pub stamps: StampTable<S>,
}

impl<S: StatusEnum> Lifecycle<S> {
    pub fn new(initial: S) -> Self {
        Self {
            initial,
            terminal: Vec::new(),
            transitions: TransitionTable::new(),
            stamps: StampTable::new(),
        }
    }

    pub fn with_terminal(mut self, terminal: &[S]) -> Self {
        self.terminal = terminal.to_vec();
        self
    }

    pub fn with_transitions(mut self, transitions: TransitionTable<S>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_stamps(mut self, stamps: StampTable<S>) -> Self {
        self.stamps = stamps;
        self
    }

    pub fn can_transition(&self, from: S, to: S) -> bool {
        self.transitions.is_allowed(from, to)
    }

    pub fn is_terminal(&self, status: S) -> bool {
        self.terminal.contains(&status)
    }

    pub fn stamp_field(&self, status: S) -> Option<&str> {
        self.stamps.field_for(status)
    }
}
