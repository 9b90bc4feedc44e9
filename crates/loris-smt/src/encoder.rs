//! Encodes a fault tree's failure structure as boolean constraints.
//!
//! One boolean variable per element stands for "this element is failed in
//! the terminal configuration". Gate variables are constrained to their
//! children; dependency triggers imply their dependents. Order-sensitive
//! gates (PAND) are abstracted by their order-insensitive AND hull, which
//! over-approximates reachability — the safe direction for the conflict
//! certifier consuming these encodings.

use loris_dft::model::{Dft, ElementId, ElementKind, FailureDistribution, GateKind};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Declarations and assertions describing one fault tree.
#[derive(Debug, Clone)]
pub struct DftEncoding {
    pub declarations: Vec<(String, SmtSort)>,
    pub assertions: Vec<SmtTerm>,
}

/// Name of the failure variable of an element.
pub fn failure_var(id: ElementId) -> String {
    format!("fail_e{id}")
}

fn fail(id: ElementId) -> SmtTerm {
    SmtTerm::var(failure_var(id))
}

/// Encode the failure structure of the whole tree.
pub fn encode_failure_structure(dft: &Dft) -> DftEncoding {
    let mut declarations = Vec::with_capacity(dft.len());
    let mut assertions = Vec::new();

    for element in dft.elements() {
        declarations.push((failure_var(element.id), SmtSort::Bool));
    }

    for element in dft.elements() {
        match &element.kind {
            ElementKind::Basic(be) => match be.distribution {
                FailureDistribution::Exponential { .. } => {}
                FailureDistribution::Constant { failed } => {
                    assertions.push(fail(element.id).eq(SmtTerm::bool(failed)));
                }
            },
            ElementKind::Gate(gate) => {
                let children: Vec<SmtTerm> = gate.children.iter().map(|&c| fail(c)).collect();
                let derived = match gate.kind {
                    // PAND and SPARE use their order-insensitive AND hull.
                    GateKind::And | GateKind::Pand | GateKind::Spare => SmtTerm::and(children),
                    GateKind::Or => SmtTerm::or(children),
                    GateKind::Vote { threshold } => {
                        SmtTerm::count_true(children).ge(SmtTerm::int(threshold as i64))
                    }
                    // Sequence enforcers never fail.
                    GateKind::Seq => SmtTerm::bool(false),
                };
                assertions.push(fail(element.id).eq(derived));
            }
            ElementKind::Dependency(dep) => {
                assertions.push(fail(element.id).eq(fail(dep.trigger)));
                for &dependent in &dep.dependents {
                    assertions.push(fail(dep.trigger).implies(fail(dependent)));
                }
            }
        }
    }

    DftEncoding {
        declarations,
        assertions,
    }
}

/// Constraint: both dependencies' triggers hold in one configuration.
pub fn triggers_hold_together(dft: &Dft, d1: ElementId, d2: ElementId) -> SmtTerm {
    let t1 = dependency_trigger(dft, d1);
    let t2 = dependency_trigger(dft, d2);
    SmtTerm::and(vec![fail(t1), fail(t2)])
}

fn dependency_trigger(dft: &Dft, dep: ElementId) -> ElementId {
    match &dft.element(dep).kind {
        ElementKind::Dependency(d) => d.trigger,
        // Callers pass dependency elements only; falling back to the
        // element itself keeps the query well-formed.
        _ => dep,
    }
}
