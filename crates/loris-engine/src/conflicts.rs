//! Detects order-dependent dependency cascades.
//!
//! The builder resolves simultaneously triggered dependencies with one
//! fixed policy; this detector certifies in advance whether that choice
//! can influence outcomes for a given tree. Run it on the normalized
//! (binary-dependency) form — splitting fan-outs first is what turns
//! intra-dependency ordering into the pairwise question answered here.
//!
//! Two strategies: exhaustive replay of every cascade under swapped
//! orders, or a structural SMT query asking whether two order-sensitive
//! cascades can be triggered in one configuration. A solver timeout is
//! reported as unknown, never guessed.

use std::collections::HashSet;

use tracing::debug;

use loris_dft::model::{Dft, ElementId, ElementKind};
use loris_dft::state::{DependencyOrder, DftState};
use loris_smt::backends::z3_backend::Z3Solver;
use loris_smt::encoder::{encode_failure_structure, triggers_hold_together};
use loris_smt::solver::{SatResult, SmtSolver};

/// How to look for conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictOptions {
    /// Use the SMT strategy instead of exhaustive exploration.
    pub use_smt: bool,
    /// Per-query solver budget in seconds; 0 is unbounded. Exhaustive
    /// exploration ignores it.
    pub solver_timeout_secs: u64,
    /// The resolution policy whose safety is being certified.
    pub dependency_order: DependencyOrder,
}

/// Outcome of conflict detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictVerdict {
    /// Some firing order produces a different outcome.
    Conflicting,
    /// Every simultaneous cascade is confluent.
    ConflictFree,
    /// The SMT strategy could not decide within its budget.
    Unknown { reason: String },
}

impl ConflictVerdict {
    pub fn is_conflicting(&self) -> bool {
        matches!(self, ConflictVerdict::Conflicting)
    }
}

/// Determine whether concurrent dependency triggers can produce
/// order-dependent outcomes.
pub fn compute_dependency_conflicts(dft: &Dft, options: &ConflictOptions) -> ConflictVerdict {
    if dft.dependencies().count() < 2 {
        return ConflictVerdict::ConflictFree;
    }
    if options.use_smt {
        smt_conflicts(dft, options)
    } else {
        exhaustive_conflicts(dft, options.dependency_order)
    }
}

/// Explore every reachable state; wherever one event fires two or more
/// dependencies, replay the cascade with each of them promoted to the
/// front and compare outcomes.
fn exhaustive_conflicts(dft: &Dft, order: DependencyOrder) -> ConflictVerdict {
    let initial = DftState::initial(dft, order);
    let mut visited: HashSet<Vec<u8>> = HashSet::new();
    visited.insert(initial.encode(dft));
    let mut queue = vec![initial];

    while let Some(state) = queue.pop() {
        for (event, _) in state.eligible_events(dft) {
            let mut baseline = state.clone();
            let fired = baseline.fail_basic_event(dft, order, event);
            if fired.len() >= 2 {
                let expected = baseline.encode(dft);
                for &promoted in &fired {
                    let mut replay = state.clone();
                    replay.fail_basic_event_prioritized(dft, order, event, promoted);
                    if replay.encode(dft) != expected {
                        debug!(
                            event = dft.name(event),
                            promoted = dft.name(promoted),
                            "non-confluent cascade"
                        );
                        return ConflictVerdict::Conflicting;
                    }
                }
            }
            let encoding = baseline.encode(dft);
            if visited.insert(encoding) {
                queue.push(baseline);
            }
        }
    }
    ConflictVerdict::ConflictFree
}

/// Ask the solver, per statically order-sensitive pair, whether both
/// triggers can hold in one configuration of the monotone structure.
fn smt_conflicts(dft: &Dft, options: &ConflictOptions) -> ConflictVerdict {
    let pairs = interacting_pairs(dft);
    if pairs.is_empty() {
        return ConflictVerdict::ConflictFree;
    }

    let mut solver = Z3Solver::with_timeout_secs(options.solver_timeout_secs);
    let encoding = encode_failure_structure(dft);
    for (name, sort) in &encoding.declarations {
        if let Err(e) = solver.declare_var(name, sort) {
            return ConflictVerdict::Unknown {
                reason: e.to_string(),
            };
        }
    }
    for assertion in &encoding.assertions {
        if let Err(e) = solver.assert(assertion) {
            return ConflictVerdict::Unknown {
                reason: e.to_string(),
            };
        }
    }

    for (d1, d2) in pairs {
        let mut query = || -> Result<SatResult, loris_smt::backends::z3_backend::Z3Error> {
            solver.push()?;
            solver.assert(&triggers_hold_together(dft, d1, d2))?;
            let result = solver.check_sat()?;
            solver.pop()?;
            Ok(result)
        };
        match query() {
            Ok(SatResult::Sat) => return ConflictVerdict::Conflicting,
            Ok(SatResult::Unsat) => {}
            Ok(SatResult::Unknown(reason)) => {
                return ConflictVerdict::Unknown {
                    reason: format!(
                        "solver gave up on pair ({}, {}): {reason}",
                        dft.name(d1),
                        dft.name(d2)
                    ),
                }
            }
            Err(e) => {
                return ConflictVerdict::Unknown {
                    reason: e.to_string(),
                }
            }
        }
    }
    ConflictVerdict::ConflictFree
}

/// Dependency pairs whose cascades an order-sensitive gate can tell
/// apart: both reach children of one PAND/SEQ gate through different
/// child slots.
fn interacting_pairs(dft: &Dft) -> Vec<(ElementId, ElementId)> {
    let deps: Vec<ElementId> = dft.dependencies().map(|e| e.id).collect();
    let affected: Vec<HashSet<ElementId>> =
        deps.iter().map(|&d| affected_elements(dft, d)).collect();

    let observers: Vec<Vec<Vec<ElementId>>> = dft
        .elements()
        .filter_map(|e| match &e.kind {
            ElementKind::Gate(gate) if gate.kind.is_order_sensitive() => Some(
                gate.children
                    .iter()
                    .map(|&c| dft.subtree(c))
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .collect();

    let mut pairs = Vec::new();
    for i in 0..deps.len() {
        for j in (i + 1)..deps.len() {
            let sensitive = observers.iter().any(|slots| {
                slots.iter().enumerate().any(|(k1, s1)| {
                    slots.iter().enumerate().any(|(k2, s2)| {
                        k1 != k2
                            && s1.iter().any(|id| affected[i].contains(id))
                            && s2.iter().any(|id| affected[j].contains(id))
                    })
                })
            });
            if sensitive {
                pairs.push((deps[i], deps[j]));
            }
        }
    }
    pairs
}

/// Elements a dependency's cascade can touch: its dependents and all
/// their gate ancestors.
fn affected_elements(dft: &Dft, dep: ElementId) -> HashSet<ElementId> {
    let mut out = HashSet::new();
    let ElementKind::Dependency(dependency) = &dft.element(dep).kind else {
        return out;
    };
    let mut work: Vec<ElementId> = dependency.dependents.clone();
    while let Some(id) = work.pop() {
        if out.insert(id) {
            work.extend_from_slice(dft.parents(id));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use loris_dft::model::{DftBuilder, GateKind};

    /// Two dependencies on one trigger racing into a PAND.
    fn racing_pand() -> Dft {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Pand, &["a", "b"]).unwrap();
        b.dependency("f1", "t", &["a"]).unwrap();
        b.dependency("f2", "t", &["b"]).unwrap();
        b.build("top").unwrap()
    }

    /// The same race, but into an order-insensitive AND.
    fn racing_and() -> Dft {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        b.dependency("f1", "t", &["a"]).unwrap();
        b.dependency("f2", "t", &["b"]).unwrap();
        b.build("top").unwrap()
    }

    #[test]
    fn exhaustive_detects_pand_race() {
        let verdict = compute_dependency_conflicts(&racing_pand(), &ConflictOptions::default());
        assert_eq!(verdict, ConflictVerdict::Conflicting);
    }

    #[test]
    fn exhaustive_clears_confluent_race() {
        let verdict = compute_dependency_conflicts(&racing_and(), &ConflictOptions::default());
        assert_eq!(verdict, ConflictVerdict::ConflictFree);
    }

    #[test]
    fn smt_detects_pand_race() {
        let options = ConflictOptions {
            use_smt: true,
            ..ConflictOptions::default()
        };
        let verdict = compute_dependency_conflicts(&racing_pand(), &options);
        assert_eq!(verdict, ConflictVerdict::Conflicting);
    }

    #[test]
    fn smt_skips_order_insensitive_pairs_entirely() {
        let options = ConflictOptions {
            use_smt: true,
            ..ConflictOptions::default()
        };
        // No PAND/SEQ observer: no pair is even worth a query.
        assert!(interacting_pairs(&racing_and()).is_empty());
        let verdict = compute_dependency_conflicts(&racing_and(), &options);
        assert_eq!(verdict, ConflictVerdict::ConflictFree);
    }

    #[test]
    fn smt_clears_races_behind_unreachable_triggers() {
        let mut b = DftBuilder::new();
        b.constant("solid", false).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Pand, &["a", "b"]).unwrap();
        b.dependency("f1", "solid", &["a"]).unwrap();
        b.dependency("f2", "solid", &["b"]).unwrap();
        let dft = b.build("top").unwrap();

        let options = ConflictOptions {
            use_smt: true,
            ..ConflictOptions::default()
        };
        assert_eq!(
            compute_dependency_conflicts(&dft, &options),
            ConflictVerdict::ConflictFree
        );
    }

    #[test]
    fn single_dependency_never_conflicts() {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Or, &["a"]).unwrap();
        b.dependency("f", "t", &["a"]).unwrap();
        let dft = b.build("top").unwrap();
        assert_eq!(
            compute_dependency_conflicts(&dft, &ConflictOptions::default()),
            ConflictVerdict::ConflictFree
        );
    }
}
