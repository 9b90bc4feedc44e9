//! The explicit state-space builder.
//!
//! Layer-synchronous BFS over canonical states: each frontier layer is
//! expanded in parallel, with the canonical-state table as the only
//! shared mutable structure (atomic insert-or-get, first writer wins the
//! id). Mass bookkeeping and frontier assembly happen sequentially
//! between layers, so rate contributions are never lost.
//!
//! The reachable state graph of a fault tree is acyclic — every
//! transition fails at least one more basic event — so the forward
//! probability mass accumulated per state is its exact hitting
//! probability in the embedded jump chain, which is what the
//! approximation bound prunes on.

use indexmap::IndexSet;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use loris_dft::model::{Dft, ElementId, ElementKind, FailureDistribution, GateKind};
use loris_dft::properties::FAILED_LABEL;
use loris_dft::relevance::RelevantEvents;
use loris_dft::state::{DependencyOrder, DftState, ElementStatus};
use loris_dft::symmetry::{canonicalize, SymmetryGroup};

use crate::ctmc::{BoundKind, Ctmc, StateId};
use crate::registry::StateRegistry;
use crate::result::BuildStatistics;

/// Label attached to states whose continuations were cut off by the
/// approximation bound.
pub const APPROXIMATION_LABEL: &str = "approximation_boundary";

/// Invalid numeric parameters discovered while building.
///
/// Fatal to the build: no partial chain is ever returned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelBuildError {
    #[error("basic event '{element}' has non-positive rate {rate}")]
    InvalidRate { element: String, rate: f64 },
    #[error("basic event '{element}' has dormancy {dormancy} outside [0, 1]")]
    InvalidDormancy { element: String, dormancy: f64 },
}

/// Configuration of one build.
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Symmetry classes used for canonicalization; the identity group
    /// disables symmetry reduction.
    pub symmetries: SymmetryGroup,
    /// Events tracked with full label fidelity.
    pub relevant: RelevantEvents,
    /// Resolution policy for simultaneously triggered dependencies.
    pub dependency_order: DependencyOrder,
    /// Defer expansion of states whose hitting mass falls below this
    /// bound; 0 builds the exact chain.
    pub approximation_bound: f64,
}

impl BuilderOptions {
    /// Exact build, no symmetry reduction, every event tracked.
    pub fn exact(dft: &Dft) -> Self {
        BuilderOptions {
            symmetries: SymmetryGroup::identity(),
            relevant: RelevantEvents::all(dft),
            dependency_order: DependencyOrder::default(),
            approximation_bound: 0.0,
        }
    }
}

/// The explicit DFT-to-CTMC builder.
pub struct ExplicitBuilder<'a> {
    dft: &'a Dft,
    options: BuilderOptions,
    stats: BuildStatistics,
}

enum Expansion {
    Deferred { id: StateId },
    Terminal { id: StateId },
    Expanded {
        id: StateId,
        transitions: Vec<(StateId, f64)>,
        fresh: Vec<(StateId, DftState)>,
        duplicates: usize,
    },
}

struct Exploration {
    rows: Vec<Vec<(StateId, f64)>>,
    labels: Vec<IndexSet<String>>,
    deferred: Vec<bool>,
}

impl<'a> ExplicitBuilder<'a> {
    pub fn new(dft: &'a Dft, options: BuilderOptions) -> Self {
        ExplicitBuilder {
            dft,
            options,
            stats: BuildStatistics::default(),
        }
    }

    /// Statistics of the most recent build.
    pub fn statistics(&self) -> &BuildStatistics {
        &self.stats
    }

    /// Build the exact chain (the approximation bound is ignored).
    pub fn build(&mut self) -> Result<Ctmc, ModelBuildError> {
        let exploration = self.explore(0.0)?;
        let mut ctmc = Ctmc::new(BoundKind::Exact);
        assemble(&mut ctmc, &exploration, |_, _| {});
        Ok(ctmc)
    }

    /// Build the lower- and upper-bound partial chains.
    ///
    /// Deferred states absorb in both; the lower-bound model treats their
    /// unexplored continuations as immediate top-level failure, the
    /// upper-bound model as never failing. For any measure the true value
    /// lies between the two, and both collapse onto the exact chain as
    /// the bound goes to zero.
    pub fn partial_models(&mut self) -> Result<(Ctmc, Ctmc), ModelBuildError> {
        let exploration = self.explore(self.options.approximation_bound)?;

        let mut lower = Ctmc::new(BoundKind::LowerBound);
        assemble(&mut lower, &exploration, |ctmc, id| {
            ctmc.add_label(id, APPROXIMATION_LABEL);
            ctmc.add_label(id, FAILED_LABEL);
        });

        let mut upper = Ctmc::new(BoundKind::UpperBound);
        assemble(&mut upper, &exploration, |ctmc, id| {
            ctmc.add_label(id, APPROXIMATION_LABEL);
        });

        Ok((lower, upper))
    }

    fn explore(&mut self, bound: f64) -> Result<Exploration, ModelBuildError> {
        self.validate()?;
        self.stats = BuildStatistics::default();

        let registry = StateRegistry::new();
        let initial = DftState::initial(self.dft, self.options.dependency_order);
        let initial = self.canonical(initial);
        let (initial_id, _) = registry.insert_or_get(initial.encode(self.dft));

        let mut rows: Vec<Vec<(StateId, f64)>> = Vec::new();
        let mut labels: Vec<IndexSet<String>> = Vec::new();
        let mut deferred: Vec<bool> = Vec::new();
        let mut mass: Vec<f64> = Vec::new();
        grow(&mut rows, &mut labels, &mut deferred, &mut mass, initial_id);
        labels[initial_id] = self.labels_of(&initial);
        mass[initial_id] = 1.0;

        let mut frontier: Vec<(StateId, DftState)> = vec![(initial_id, initial)];

        while !frontier.is_empty() {
            self.stats.layers += 1;

            let expansions: Vec<Expansion> = {
                let mass = &mass;
                frontier
                    .par_iter()
                    .map(|(id, state)| self.expand(&registry, *id, state, mass[*id], bound))
                    .collect()
            };

            let mut next_frontier = Vec::new();
            for expansion in expansions {
                match expansion {
                    Expansion::Deferred { id } => {
                        deferred[id] = true;
                        rows[id] = vec![(id, 1.0)];
                        self.stats.deferred += 1;
                    }
                    Expansion::Terminal { id } => {
                        rows[id] = vec![(id, 1.0)];
                    }
                    Expansion::Expanded {
                        id,
                        transitions,
                        fresh,
                        duplicates,
                    } => {
                        self.stats.deduplicated += duplicates;
                        let exit: f64 = transitions.iter().map(|&(_, r)| r).sum();
                        for (successor, state) in fresh {
                            grow(&mut rows, &mut labels, &mut deferred, &mut mass, successor);
                            labels[successor] = self.labels_of(&state);
                            next_frontier.push((successor, state));
                        }
                        for &(successor, rate) in &transitions {
                            grow(&mut rows, &mut labels, &mut deferred, &mut mass, successor);
                            mass[successor] += mass[id] * rate / exit;
                        }
                        rows[id] = transitions;
                    }
                }
            }

            debug!(
                layer = self.stats.layers,
                frontier = next_frontier.len(),
                states = rows.len(),
                "layer expanded"
            );
            frontier = next_frontier;
        }

        self.stats.states = rows.len();
        self.stats.transitions = rows.iter().map(Vec::len).sum();
        info!(stats = %self.stats, "state space built");

        Ok(Exploration {
            rows,
            labels,
            deferred,
        })
    }

    fn expand(
        &self,
        registry: &StateRegistry,
        id: StateId,
        state: &DftState,
        mass: f64,
        bound: f64,
    ) -> Expansion {
        if bound > 0.0 && mass < bound {
            return Expansion::Deferred { id };
        }
        let events = state.eligible_events(self.dft);
        if events.is_empty() || self.relevant_decided(state) {
            return Expansion::Terminal { id };
        }

        // Successors merged by canonical encoding before they ever reach
        // the shared table, so parallel edges collapse per source.
        let mut successors: Vec<(Vec<u8>, DftState, f64)> = Vec::with_capacity(events.len());
        let mut duplicates = 0;
        for (event, rate) in events {
            let mut next = state.clone();
            next.fail_basic_event(self.dft, self.options.dependency_order, event);
            let canonical = self.canonical(next);
            let encoding = canonical.encode(self.dft);
            match successors.iter_mut().find(|(enc, _, _)| *enc == encoding) {
                Some(entry) => {
                    entry.2 += rate;
                    duplicates += 1;
                }
                None => successors.push((encoding, canonical, rate)),
            }
        }

        let mut transitions = Vec::with_capacity(successors.len());
        let mut fresh = Vec::new();
        for (encoding, state, rate) in successors {
            let (successor, inserted) = registry.insert_or_get(encoding);
            transitions.push((successor, rate));
            if inserted {
                fresh.push((successor, state));
            } else {
                duplicates += 1;
            }
        }

        Expansion::Expanded {
            id,
            transitions,
            fresh,
            duplicates,
        }
    }

    fn canonical(&self, state: DftState) -> DftState {
        if self.options.symmetries.is_empty() {
            state
        } else {
            canonicalize(self.dft, &self.options.symmetries, &state)
        }
    }

    /// Labels of a state: each relevant failed element's name, plus the
    /// `failed` pseudo-label when the top element is down.
    fn labels_of(&self, state: &DftState) -> IndexSet<String> {
        let mut labels = IndexSet::new();
        for id in self.options.relevant.ids() {
            if state.is_failed(id) {
                labels.insert(self.dft.name(id).to_string());
            }
        }
        if state.is_failed(self.dft.top()) {
            labels.insert(FAILED_LABEL.to_string());
        }
        labels
    }

    /// Terminal once the top element is decided and no continuation can
    /// change any relevant label.
    fn relevant_decided(&self, state: &DftState) -> bool {
        state.status(self.dft.top()) != ElementStatus::Operational
            && self
                .options
                .relevant
                .ids()
                .all(|id| self.is_decided(state, id))
    }

    fn is_decided(&self, state: &DftState, id: ElementId) -> bool {
        if state.status(id) != ElementStatus::Operational {
            return true;
        }
        match &self.dft.element(id).kind {
            ElementKind::Gate(gate) => gate.kind == GateKind::Seq,
            ElementKind::Basic(be) => {
                matches!(be.distribution, FailureDistribution::Constant { failed: false })
            }
            ElementKind::Dependency(_) => true,
        }
    }

    fn validate(&self) -> Result<(), ModelBuildError> {
        for element in self.dft.basic_events() {
            let Some(be) = element.as_basic() else {
                continue;
            };
            if let FailureDistribution::Exponential { rate, dormancy } = be.distribution {
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(ModelBuildError::InvalidRate {
                        element: element.name.clone(),
                        rate,
                    });
                }
                if !dormancy.is_finite() || !(0.0..=1.0).contains(&dormancy) {
                    return Err(ModelBuildError::InvalidDormancy {
                        element: element.name.clone(),
                        dormancy,
                    });
                }
            }
        }
        Ok(())
    }
}

fn assemble<F>(ctmc: &mut Ctmc, exploration: &Exploration, mut on_deferred: F)
where
    F: FnMut(&mut Ctmc, StateId),
{
    for labels in &exploration.labels {
        ctmc.add_state(labels.clone());
    }
    for (id, row) in exploration.rows.iter().enumerate() {
        for &(target, rate) in row {
            ctmc.add_transition(id, target, rate);
        }
    }
    for (id, &deferred) in exploration.deferred.iter().enumerate() {
        if deferred {
            on_deferred(ctmc, id);
        }
    }
    ctmc.set_initial(0);
}

fn grow(
    rows: &mut Vec<Vec<(StateId, f64)>>,
    labels: &mut Vec<IndexSet<String>>,
    deferred: &mut Vec<bool>,
    mass: &mut Vec<f64>,
    id: StateId,
) {
    if id >= rows.len() {
        rows.resize_with(id + 1, Vec::new);
        labels.resize_with(id + 1, IndexSet::new);
        deferred.resize(id + 1, false);
        mass.resize(id + 1, 0.0);
    }
}
