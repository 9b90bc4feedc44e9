//! The labeled continuous-time Markov chain emitted by the builder.
//!
//! Downstream solving is someone else's linear algebra; this container
//! only exposes what a checker needs: a sparse rate matrix, the initial
//! state, and per-state label sets.

use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;

/// Identifier of a chain state.
pub type StateId = usize;

/// Which measure a chain's answers bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoundKind {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "lower_bound")]
    LowerBound,
    #[serde(rename = "upper_bound")]
    UpperBound,
}

/// A sparse labeled CTMC.
#[derive(Debug, Clone)]
pub struct Ctmc {
    initial: StateId,
    rows: Vec<Vec<(StateId, f64)>>,
    labels: Vec<IndexSet<String>>,
    bound: BoundKind,
}

impl Ctmc {
    pub fn new(bound: BoundKind) -> Self {
        Ctmc {
            initial: 0,
            rows: Vec::new(),
            labels: Vec::new(),
            bound,
        }
    }

    pub fn set_initial(&mut self, id: StateId) {
        self.initial = id;
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn bound(&self) -> BoundKind {
        self.bound
    }

    /// Append a state, returning its id.
    pub fn add_state(&mut self, labels: IndexSet<String>) -> StateId {
        let id = self.rows.len();
        self.rows.push(Vec::new());
        self.labels.push(labels);
        id
    }

    /// Record a transition; parallel edges are merged by summing rates so
    /// the rate matrix stays well-formed.
    pub fn add_transition(&mut self, from: StateId, to: StateId, rate: f64) {
        let row = &mut self.rows[from];
        if let Some(entry) = row.iter_mut().find(|(t, _)| *t == to) {
            entry.1 += rate;
        } else {
            row.push((to, rate));
        }
    }

    pub fn add_label(&mut self, state: StateId, label: impl Into<String>) {
        self.labels[state].insert(label.into());
    }

    pub fn state_count(&self) -> usize {
        self.rows.len()
    }

    pub fn transition_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn labels_of(&self, state: StateId) -> &IndexSet<String> {
        &self.labels[state]
    }

    pub fn has_label(&self, state: StateId, label: &str) -> bool {
        self.labels[state].contains(label)
    }

    /// Membership vector of a label over all states.
    pub fn states_with_label(&self, label: &str) -> Vec<bool> {
        (0..self.state_count())
            .map(|s| self.has_label(s, label))
            .collect()
    }

    /// The sparse rate matrix, row per state.
    pub fn rows(&self) -> &[Vec<(StateId, f64)>] {
        &self.rows
    }

    /// Total exit rate of a state, self-loops excluded.
    pub fn exit_rate(&self, state: StateId) -> f64 {
        self.rows[state]
            .iter()
            .filter(|&&(t, _)| t != state)
            .map(|&(_, r)| r)
            .sum()
    }
}

impl fmt::Display for Ctmc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CTMC: {} states, {} transitions ({:?})",
            self.state_count(),
            self.transition_count(),
            self.bound
        )?;
        for (id, row) in self.rows.iter().enumerate() {
            let labels: Vec<&str> = self.labels[id].iter().map(String::as_str).collect();
            write!(f, "  s{id}")?;
            if !labels.is_empty() {
                write!(f, " {{{}}}", labels.join(", "))?;
            }
            write!(f, ":")?;
            for (target, rate) in row {
                write!(f, " -> s{target} @{rate}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
