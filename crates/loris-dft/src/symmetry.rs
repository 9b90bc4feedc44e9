//! Detects interchangeable subtrees and canonicalizes states under them.
//!
//! Elements are first partitioned by a structural signature (gate kind,
//! distribution parameters, child signatures); candidate classes are then
//! validated by checking that swapping the subtrees really is an
//! automorphism of the tree. A validated class lets the builder map every
//! reachable state to a canonical representative, collapsing symmetric
//! states into one.

use crate::model::{Dft, ElementId, ElementKind, FailureDistribution, GateKind};
use crate::state::DftState;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One class of interchangeable sibling subtrees.
///
/// `members[i]` lists the elements of the i-th subtree in aligned
/// traversal order: position `p` of any two members corresponds under the
/// subtree isomorphism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryClass {
    pub members: Vec<Vec<ElementId>>,
}

/// All symmetry classes of a tree, ordered innermost-first so that
/// sequential canonicalization is hierarchical.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymmetryGroup {
    pub classes: Vec<SymmetryClass>,
}

impl SymmetryGroup {
    /// The trivial group: no states are identified.
    pub fn identity() -> Self {
        SymmetryGroup::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

/// Compute the equivalence classes of interchangeable subtrees.
pub fn compute_symmetries(dft: &Dft) -> SymmetryGroup {
    let signatures = compute_signatures(dft);
    let dep_involved = dependency_involved(dft);

    let mut classes = Vec::new();
    for element in dft.elements() {
        let ElementKind::Gate(gate) = &element.kind else {
            continue;
        };
        // Only gates with unordered children admit sibling swaps; PAND,
        // SEQ and SPARE semantics observe child positions.
        if !gate.kind.is_unordered() {
            continue;
        }

        let mut by_signature: indexmap::IndexMap<u64, Vec<ElementId>> = indexmap::IndexMap::new();
        for &child in &gate.children {
            by_signature.entry(signatures[child]).or_default().push(child);
        }

        for (_, roots) in by_signature {
            if roots.len() < 2 {
                continue;
            }
            let members: Vec<Vec<ElementId>> = roots
                .iter()
                .map(|&root| aligned_subtree(dft, root, &signatures))
                .collect();
            let valid = validate_members(dft, element.id, &members, &signatures, &dep_involved);
            if valid.len() >= 2 {
                classes.push(SymmetryClass { members: valid });
            }
        }
    }

    // Innermost classes first: a nested member subtree is strictly smaller
    // than the one enclosing it.
    classes.sort_by_key(|c| (c.members[0].len(), c.members[0][0]));
    SymmetryGroup { classes }
}

/// Map a state to its class representative: within each class, member
/// contents are permuted into lexicographically-least encoding order.
///
/// Deterministic by construction, so repeated canonicalization of equal
/// semantic states yields byte-identical encodings — the property the
/// builder's deduplication relies on.
pub fn canonicalize(dft: &Dft, group: &SymmetryGroup, state: &DftState) -> DftState {
    let mut canonical = state.clone();
    for class in &group.classes {
        let mut keyed: Vec<(Vec<u8>, usize)> = class
            .members
            .iter()
            .enumerate()
            .map(|(i, member)| (member_encoding(&canonical, member), i))
            .collect();
        keyed.sort();
        if keyed.iter().enumerate().all(|(i, &(_, old))| i == old) {
            continue;
        }
        let source = canonical.clone();
        for (slot, &(_, old)) in keyed.iter().enumerate() {
            let dst_member = &class.members[slot];
            let src_member = &class.members[old];
            for (p, &dst) in dst_member.iter().enumerate() {
                let src = src_member[p];
                canonical.status[dst] = source.status[src];
                canonical.stamp[dst] = source.stamp[src];
                canonical.claims[dst] = source.claims[src];
            }
        }
    }
    canonical
}

/// Per-member state content in position order: status, stamp, claim slot.
fn member_encoding(state: &DftState, member: &[ElementId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(member.len() * 6);
    for &id in member {
        out.push(match state.status(id) {
            crate::state::ElementStatus::Operational => 0,
            crate::state::ElementStatus::Failed => 1,
            crate::state::ElementStatus::FailSafe => 2,
        });
        out.extend_from_slice(&state.stamp(id).to_le_bytes());
        out.push(match state.claims[id] {
            Some(slot) => slot as u8 + 1,
            None => 0,
        });
    }
    out
}

/// Structural signature of every element.
///
/// Equal signatures are necessary (not sufficient) for interchangeability;
/// sufficiency is established by [`validate_members`].
fn compute_signatures(dft: &Dft) -> Vec<u64> {
    fn visit(dft: &Dft, id: ElementId, memo: &mut [Option<u64>], on_stack: &mut [bool]) -> u64 {
        if let Some(s) = memo[id] {
            return s;
        }
        if on_stack[id] {
            // Cyclic trees are rejected by the well-formedness checker;
            // return a fixed tag so signature computation still terminates.
            return 0x9e37_79b9;
        }
        on_stack[id] = true;
        let mut hasher = DefaultHasher::new();
        match &dft.element(id).kind {
            ElementKind::Basic(be) => match be.distribution {
                FailureDistribution::Exponential { rate, dormancy } => {
                    (0u8, rate.to_bits(), dormancy.to_bits()).hash(&mut hasher);
                }
                FailureDistribution::Constant { failed } => {
                    (1u8, failed).hash(&mut hasher);
                }
            },
            ElementKind::Gate(gate) => {
                let tag: (u8, usize) = match gate.kind {
                    GateKind::And => (2, 0),
                    GateKind::Or => (3, 0),
                    GateKind::Vote { threshold } => (4, threshold),
                    GateKind::Pand => (5, 0),
                    GateKind::Spare => (6, 0),
                    GateKind::Seq => (7, 0),
                };
                tag.hash(&mut hasher);
                let mut child_sigs: Vec<u64> = gate
                    .children
                    .iter()
                    .map(|&c| visit(dft, c, memo, on_stack))
                    .collect();
                if gate.kind.is_unordered() {
                    child_sigs.sort_unstable();
                }
                child_sigs.hash(&mut hasher);
            }
            ElementKind::Dependency(dep) => {
                8u8.hash(&mut hasher);
                visit(dft, dep.trigger, memo, on_stack).hash(&mut hasher);
                let mut dep_sigs: Vec<u64> = dep
                    .dependents
                    .iter()
                    .map(|&d| visit(dft, d, memo, on_stack))
                    .collect();
                dep_sigs.sort_unstable();
                dep_sigs.hash(&mut hasher);
            }
        }
        on_stack[id] = false;
        let sig = hasher.finish();
        memo[id] = Some(sig);
        sig
    }

    let mut memo = vec![None; dft.len()];
    let mut on_stack = vec![false; dft.len()];
    (0..dft.len())
        .map(|id| visit(dft, id, &mut memo, &mut on_stack))
        .collect()
}

fn dependency_involved(dft: &Dft) -> Vec<bool> {
    let mut involved = vec![false; dft.len()];
    for element in dft.dependencies() {
        if let ElementKind::Dependency(dep) = &element.kind {
            involved[dep.trigger] = true;
            for &d in &dep.dependents {
                involved[d] = true;
            }
        }
    }
    involved
}

/// Subtree elements in a traversal order that aligns isomorphic subtrees
/// position by position: children of unordered gates are visited in
/// signature order, everything else in declaration order.
fn aligned_subtree(dft: &Dft, root: ElementId, signatures: &[u64]) -> Vec<ElementId> {
    let mut seen = vec![false; dft.len()];
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if seen[id] {
            continue;
        }
        seen[id] = true;
        out.push(id);
        if let ElementKind::Gate(gate) = &dft.element(id).kind {
            let mut children = gate.children.clone();
            if gate.kind.is_unordered() {
                children.sort_by_key(|&c| signatures[c]);
            }
            for &child in children.iter().rev() {
                stack.push(child);
            }
        }
    }
    out
}

/// Keep only the members whose swap really commutes with the tree
/// structure: pairwise disjoint, closed under parent edges, untouched by
/// dependencies, and signature-aligned position by position.
fn validate_members(
    dft: &Dft,
    parent_gate: ElementId,
    members: &[Vec<ElementId>],
    signatures: &[u64],
    dep_involved: &[bool],
) -> Vec<Vec<ElementId>> {
    let mut valid: Vec<Vec<ElementId>> = Vec::new();
    'member: for member in members {
        let inside: std::collections::HashSet<ElementId> = member.iter().copied().collect();
        let root = member[0];
        // The root is used by the candidate gate alone; interior elements
        // only by gates inside the member.
        if dft.parents(root).iter().any(|&p| p != parent_gate) || dft.parents(root).len() != 1 {
            continue 'member;
        }
        for &id in &member[1..] {
            if dft.parents(id).iter().any(|&p| !inside.contains(&p)) {
                continue 'member;
            }
        }
        for &id in member {
            if dep_involved[id] {
                continue 'member;
            }
        }
        // Alignment against an already accepted member.
        if let Some(reference) = valid.first() {
            if reference.len() != member.len() {
                continue 'member;
            }
            for (p, &id) in member.iter().enumerate() {
                if signatures[reference[p]] != signatures[id] {
                    continue 'member;
                }
            }
            if valid
                .iter()
                .any(|other| other.iter().any(|id| inside.contains(id)))
            {
                continue 'member;
            }
        }
        valid.push(member.clone());
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DftBuilder;
    use crate::state::DependencyOrder;

    fn symmetric_and() -> Dft {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        b.build("top").unwrap()
    }

    #[test]
    fn identical_siblings_form_a_class() {
        let dft = symmetric_and();
        let group = compute_symmetries(&dft);
        assert_eq!(group.len(), 1);
        assert_eq!(
            group.classes[0].members,
            vec![
                vec![dft.element_id("a").unwrap()],
                vec![dft.element_id("b").unwrap()]
            ]
        );
    }

    #[test]
    fn different_rates_break_the_symmetry() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 2.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        let dft = b.build("top").unwrap();
        assert!(compute_symmetries(&dft).is_empty());
    }

    #[test]
    fn pand_children_are_never_interchangeable() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::Pand, &["a", "b"]).unwrap();
        let dft = b.build("top").unwrap();
        assert!(compute_symmetries(&dft).is_empty());
    }

    #[test]
    fn dependency_involvement_breaks_the_symmetry() {
        let mut b = DftBuilder::new();
        b.exponential("t", 1.0, 1.0).unwrap();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.gate("top", GateKind::And, &["a", "b"]).unwrap();
        b.dependency("f", "t", &["a"]).unwrap();
        let dft = b.build("top").unwrap();
        assert!(compute_symmetries(&dft).is_empty());
    }

    #[test]
    fn shared_subtrees_are_rejected() {
        let mut b = DftBuilder::new();
        b.exponential("shared", 1.0, 1.0).unwrap();
        b.gate("g1", GateKind::Or, &["shared"]).unwrap();
        b.gate("g2", GateKind::Or, &["shared"]).unwrap();
        b.gate("top", GateKind::And, &["g1", "g2"]).unwrap();
        let dft = b.build("top").unwrap();
        assert!(compute_symmetries(&dft).is_empty());
    }

    #[test]
    fn canonicalization_collapses_mirror_states() {
        let dft = symmetric_and();
        let group = compute_symmetries(&dft);

        let mut s1 = DftState::initial(&dft, DependencyOrder::ElementId);
        s1.fail_basic_event(&dft, DependencyOrder::ElementId, dft.element_id("a").unwrap());
        let mut s2 = DftState::initial(&dft, DependencyOrder::ElementId);
        s2.fail_basic_event(&dft, DependencyOrder::ElementId, dft.element_id("b").unwrap());

        let c1 = canonicalize(&dft, &group, &s1);
        let c2 = canonicalize(&dft, &group, &s2);
        assert_eq!(c1.encode(&dft), c2.encode(&dft));
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let dft = symmetric_and();
        let group = compute_symmetries(&dft);
        let mut state = DftState::initial(&dft, DependencyOrder::ElementId);
        state.fail_basic_event(&dft, DependencyOrder::ElementId, dft.element_id("b").unwrap());
        let once = canonicalize(&dft, &group, &state);
        let twice = canonicalize(&dft, &group, &once);
        assert_eq!(once.encode(&dft), twice.encode(&dft));
    }

    #[test]
    fn nested_symmetric_subtrees_canonicalize_hierarchically() {
        let mut b = DftBuilder::new();
        b.exponential("a", 1.0, 1.0).unwrap();
        b.exponential("b", 1.0, 1.0).unwrap();
        b.exponential("c", 1.0, 1.0).unwrap();
        b.exponential("d", 1.0, 1.0).unwrap();
        b.gate("left", GateKind::Or, &["a", "b"]).unwrap();
        b.gate("right", GateKind::Or, &["c", "d"]).unwrap();
        b.gate("top", GateKind::And, &["left", "right"]).unwrap();
        let dft = b.build("top").unwrap();

        let group = compute_symmetries(&dft);
        // {a,b}, {c,d}, and {left-subtree, right-subtree}, innermost first
        assert_eq!(group.len(), 3);
        assert!(group.classes[0].members[0].len() < group.classes[2].members[0].len());

        // Any single basic-event failure is one canonical state.
        let canonical_encodings: std::collections::HashSet<Vec<u8>> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| {
                let mut s = DftState::initial(&dft, DependencyOrder::ElementId);
                s.fail_basic_event(&dft, DependencyOrder::ElementId, dft.element_id(name).unwrap());
                canonicalize(&dft, &group, &s).encode(&dft)
            })
            .collect();
        assert_eq!(canonical_encodings.len(), 1);
    }
}
