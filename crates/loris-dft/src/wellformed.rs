//! Structural validation of a fault tree.
//!
//! Violations are reported as data, not errors: callers routinely probe a
//! tree they know to be non-normalized (e.g. before running the
//! transformer), so the checker is a query rather than a control-flow
//! mechanism.

use crate::model::{Dft, ElementId, ElementKind, GateKind};

/// Outcome of a well-formedness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellFormedness {
    pub ok: bool,
    /// Human-readable findings, `"well-formed"` when `ok`.
    pub diagnostic: String,
}

/// Check the structural constraints the state-space builder assumes.
pub fn is_well_formed(dft: &Dft) -> WellFormedness {
    let mut findings = Vec::new();

    for element in dft.elements() {
        match &element.kind {
            ElementKind::Gate(gate) => {
                check_arity(&mut findings, &element.name, gate.kind, gate.children.len());
            }
            ElementKind::Dependency(dep) => {
                if dep.dependents.is_empty() {
                    findings.push(format!("dependency '{}' has no dependents", element.name));
                }
                if dep.dependents.len() > 1 {
                    findings.push(format!(
                        "dependency '{}' is not binary ({} dependents)",
                        element.name,
                        dep.dependents.len()
                    ));
                }
                for &dependent in &dep.dependents {
                    if !dft.element(dependent).is_basic() {
                        findings.push(format!(
                            "dependency '{}' forces non-basic element '{}'",
                            element.name,
                            dft.name(dependent)
                        ));
                    }
                    if dependent == dep.trigger {
                        findings.push(format!(
                            "dependency '{}' triggers on its own dependent '{}'",
                            element.name,
                            dft.name(dependent)
                        ));
                    }
                }
            }
            ElementKind::Basic(_) => {}
        }
    }

    for orphan in orphaned_elements(dft) {
        findings.push(format!("element '{}' is orphaned", dft.name(orphan)));
    }

    for cycle_gate in gates_on_cycles(dft) {
        findings.push(format!(
            "cycle through gate '{}'",
            dft.name(cycle_gate)
        ));
    }

    if findings.is_empty() {
        WellFormedness {
            ok: true,
            diagnostic: "well-formed".to_string(),
        }
    } else {
        WellFormedness {
            ok: false,
            diagnostic: findings.join("; "),
        }
    }
}

fn check_arity(findings: &mut Vec<String>, name: &str, kind: GateKind, children: usize) {
    let complaint = match kind {
        GateKind::And | GateKind::Or if children == 0 => {
            Some(format!("{kind} gate '{name}' has no children"))
        }
        GateKind::Vote { threshold } => {
            if children == 0 {
                Some(format!("vote gate '{name}' has no children"))
            } else if threshold == 0 || threshold > children {
                Some(format!(
                    "vote gate '{name}' has threshold {threshold} outside 1..={children}"
                ))
            } else {
                None
            }
        }
        GateKind::Pand | GateKind::Seq if children < 2 => Some(format!(
            "{kind} gate '{name}' needs at least two children to order"
        )),
        GateKind::Spare if children < 2 => Some(format!(
            "spare gate '{name}' needs a primary and at least one spare"
        )),
        _ => None,
    };
    if let Some(c) = complaint {
        findings.push(c);
    }
}

/// Elements neither reachable from the top element nor touched by any
/// dependency.
fn orphaned_elements(dft: &Dft) -> Vec<ElementId> {
    let mut reached = vec![false; dft.len()];
    for id in dft.subtree(dft.top()) {
        reached[id] = true;
    }
    for element in dft.dependencies() {
        reached[element.id] = true;
        if let ElementKind::Dependency(dep) = &element.kind {
            for id in dft.subtree(dep.trigger) {
                reached[id] = true;
            }
            for &dependent in &dep.dependents {
                reached[dependent] = true;
            }
        }
    }
    (0..dft.len()).filter(|&id| !reached[id]).collect()
}

/// Gates participating in a gate-child cycle (dependencies excluded; they
/// are the sanctioned cross-references).
fn gates_on_cycles(dft: &Dft) -> Vec<ElementId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    fn visit(dft: &Dft, id: ElementId, marks: &mut [Mark], out: &mut Vec<ElementId>) {
        marks[id] = Mark::Grey;
        if let ElementKind::Gate(gate) = &dft.element(id).kind {
            for &child in &gate.children {
                match marks[child] {
                    // back edge: this gate closes a cycle
                    Mark::Grey => out.push(id),
                    Mark::White => visit(dft, child, marks, out),
                    Mark::Black => {}
                }
            }
        }
        marks[id] = Mark::Black;
    }

    let mut marks = vec![Mark::White; dft.len()];
    let mut out = Vec::new();
    for id in 0..dft.len() {
        if marks[id] == Mark::White {
            visit(dft, id, &mut marks, &mut out);
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DftBuilder;

    #[test]
    fn simple_tree_is_well_formed() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        let check = is_well_formed(&b.build("top").unwrap());
        assert!(check.ok);
        assert_eq!(check.diagnostic, "well-formed");
    }

    #[test]
    fn non_binary_dependency_is_flagged() {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        b.dependency("f", "t", &["a", "b"]).unwrap();
        let check = is_well_formed(&b.build("top").unwrap());
        assert!(!check.ok);
        assert!(check.diagnostic.contains("not binary"));
    }

    #[test]
    fn vote_threshold_out_of_range_is_flagged() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Vote { threshold: 3 }, &["a"]).unwrap();
        let check = is_well_formed(&b.build("top").unwrap());
        assert!(!check.ok);
        assert!(check.diagnostic.contains("threshold"));
    }

    #[test]
    fn unreferenced_element_is_an_orphan() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("stray", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Or, &["a"]).unwrap();
        let check = is_well_formed(&b.build("top").unwrap());
        assert!(!check.ok);
        assert!(check.diagnostic.contains("'stray' is orphaned"));
    }

    #[test]
    fn dependency_trigger_is_not_an_orphan() {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Or, &["a"]).unwrap();
        b.dependency("f", "t", &["a"]).unwrap();
        assert!(is_well_formed(&b.build("top").unwrap()).ok);
    }

    #[test]
    fn gate_cycle_is_flagged() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.gate("g1", GateKind::Or, &["a", "g2"]).unwrap();
        b.gate("g2", GateKind::Or, &["g1"]).unwrap();
        let check = is_well_formed(&b.build("g1").unwrap());
        assert!(!check.ok);
        assert!(check.diagnostic.contains("cycle through gate"));
    }
}
