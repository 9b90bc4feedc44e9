//! Runtime failure state and bottom-up propagation.
//!
//! A [`DftState`] is a snapshot of every element's failure status plus the
//! auxiliary data the order-sensitive gates and spare claiming need: a
//! failure-order stamp for elements observed by PAND/SEQ gates, and the
//! currently used child slot of every SPARE gate. Activation (which spare
//! modules are live, and hence which basic events fail at full rate) is
//! derived from the claims rather than stored.

use crate::model::{Dft, ElementId, ElementKind, FailureDistribution, GateKind};
use std::cmp::Ordering;

/// Failure status of a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementStatus {
    Operational,
    Failed,
    /// The element can no longer fail in any continuation of this state
    /// (e.g. a PAND whose children failed out of order).
    FailSafe,
}

/// Resolution policy when one failure triggers several dependencies at once.
///
/// The policy must be fixed per analysis; the conflict detector certifies
/// whether the choice can influence outcomes for a given tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyOrder {
    /// Fire pending dependencies in ascending element-id order.
    #[default]
    ElementId,
    /// Fire pending dependencies in lexicographic element-name order.
    ElementName,
}

impl DependencyOrder {
    fn compare(&self, dft: &Dft, a: ElementId, b: ElementId) -> Ordering {
        match self {
            DependencyOrder::ElementId => a.cmp(&b),
            DependencyOrder::ElementName => dft.name(a).cmp(dft.name(b)).then(a.cmp(&b)),
        }
    }
}

/// A snapshot of the runtime status of every element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DftState {
    pub(crate) status: Vec<ElementStatus>,
    /// Failure-order stamp, only maintained for order-tracked elements.
    /// 0 means "not failed yet"; stamps are dense ranks among tracked
    /// failures, so states reached through equivalent orders encode alike.
    pub(crate) stamp: Vec<u32>,
    pub(crate) next_stamp: u32,
    /// For SPARE gates, the child slot currently in use. `None` once the
    /// gate has run out of claimable children.
    pub(crate) claims: Vec<Option<usize>>,
}

impl DftState {
    /// The all-operational configuration, with constant-failed events
    /// already applied (in dependency-policy order).
    pub fn initial(dft: &Dft, order: DependencyOrder) -> Self {
        let n = dft.len();
        let mut claims = vec![None; n];
        for element in dft.elements() {
            if let ElementKind::Gate(gate) = &element.kind {
                if gate.kind == GateKind::Spare && !gate.children.is_empty() {
                    claims[element.id] = Some(0);
                }
            }
        }
        let mut state = DftState {
            status: vec![ElementStatus::Operational; n],
            stamp: vec![0; n],
            next_stamp: 0,
            claims,
        };
        for element in dft.elements() {
            if let ElementKind::Basic(be) = &element.kind {
                if be.distribution == (FailureDistribution::Constant { failed: true })
                    && state.status[element.id] == ElementStatus::Operational
                {
                    state.fail_basic_event(dft, order, element.id);
                }
            }
        }
        state
    }

    pub fn status(&self, id: ElementId) -> ElementStatus {
        self.status[id]
    }

    pub fn is_failed(&self, id: ElementId) -> bool {
        self.status[id] == ElementStatus::Failed
    }

    /// Failure-order stamp of an order-tracked element (0 if operational).
    pub fn stamp(&self, id: ElementId) -> u32 {
        self.stamp[id]
    }

    /// Currently used child slot of a SPARE gate.
    pub fn claim(&self, gate: ElementId) -> Option<usize> {
        self.claims[gate]
    }

    /// Fail one basic event and propagate: gate statuses update bottom-up
    /// and triggered dependencies force their dependents transitively, in
    /// the given policy order. Returns the dependencies fired, in order.
    pub fn fail_basic_event(
        &mut self,
        dft: &Dft,
        order: DependencyOrder,
        event: ElementId,
    ) -> Vec<ElementId> {
        self.fail_with(dft, event, &|d, a, b| order.compare(d, a, b))
    }

    /// Like [`fail_basic_event`](Self::fail_basic_event), but one pending
    /// dependency jumps the queue. Used to replay cascades under swapped
    /// orders when probing for conflicts.
    pub fn fail_basic_event_prioritized(
        &mut self,
        dft: &Dft,
        order: DependencyOrder,
        event: ElementId,
        first: ElementId,
    ) -> Vec<ElementId> {
        self.fail_with(dft, event, &|d, a, b| {
            if a == first && b != first {
                Ordering::Less
            } else if b == first && a != first {
                Ordering::Greater
            } else {
                order.compare(d, a, b)
            }
        })
    }

    fn fail_with<F>(&mut self, dft: &Dft, event: ElementId, priority: &F) -> Vec<ElementId>
    where
        F: Fn(&Dft, ElementId, ElementId) -> Ordering,
    {
        let mut fired = Vec::new();
        let mut pending: Vec<ElementId> = Vec::new();
        self.apply_failure(dft, event, &mut pending);
        while !pending.is_empty() {
            pending.sort_by(|a, b| priority(dft, *a, *b));
            let dep_id = pending.remove(0);
            fired.push(dep_id);
            let ElementKind::Dependency(dep) = &dft.element(dep_id).kind else {
                continue;
            };
            for &dependent in &dep.dependents {
                if self.status[dependent] == ElementStatus::Operational {
                    self.apply_failure(dft, dependent, &mut pending);
                }
            }
        }
        fired
    }

    /// Mark one element failed and settle all structural consequences,
    /// collecting newly triggered dependencies into `pending`.
    fn apply_failure(&mut self, dft: &Dft, root: ElementId, pending: &mut Vec<ElementId>) {
        let mut failed_work = vec![root];
        while let Some(id) = failed_work.pop() {
            if self.status[id] != ElementStatus::Operational {
                continue;
            }
            self.status[id] = ElementStatus::Failed;
            if dft.is_order_tracked(id) {
                self.next_stamp += 1;
                self.stamp[id] = self.next_stamp;
            }
            pending.extend_from_slice(dft.dependencies_triggered_by(id));
            for &parent in dft.parents(id) {
                self.reevaluate(dft, parent, &mut failed_work);
            }
        }
    }

    /// Re-derive one gate's status after a child changed.
    fn reevaluate(&mut self, dft: &Dft, gate_id: ElementId, failed_work: &mut Vec<ElementId>) {
        if self.status[gate_id] != ElementStatus::Operational {
            return;
        }
        let ElementKind::Gate(gate) = &dft.element(gate_id).kind else {
            return;
        };
        let children = &gate.children;
        match gate.kind {
            GateKind::And => {
                if children.iter().all(|&c| self.status[c] == ElementStatus::Failed) {
                    failed_work.push(gate_id);
                } else if children
                    .iter()
                    .any(|&c| self.status[c] == ElementStatus::FailSafe)
                {
                    self.mark_fail_safe(dft, gate_id, failed_work);
                }
            }
            GateKind::Or => {
                if children.iter().any(|&c| self.status[c] == ElementStatus::Failed) {
                    failed_work.push(gate_id);
                } else if children
                    .iter()
                    .all(|&c| self.status[c] == ElementStatus::FailSafe)
                {
                    self.mark_fail_safe(dft, gate_id, failed_work);
                }
            }
            GateKind::Vote { threshold } => {
                let failed = children
                    .iter()
                    .filter(|&&c| self.status[c] == ElementStatus::Failed)
                    .count();
                let operational = children
                    .iter()
                    .filter(|&&c| self.status[c] == ElementStatus::Operational)
                    .count();
                if failed >= threshold {
                    failed_work.push(gate_id);
                } else if failed + operational < threshold {
                    self.mark_fail_safe(dft, gate_id, failed_work);
                }
            }
            GateKind::Pand => {
                let fail_safe = children.iter().enumerate().any(|(j, &cj)| {
                    self.status[cj] == ElementStatus::FailSafe
                        || (self.status[cj] == ElementStatus::Failed
                            && children[..j].iter().any(|&ci| {
                                self.status[ci] == ElementStatus::Operational
                                    || (self.status[ci] == ElementStatus::Failed
                                        && self.stamp[ci] > self.stamp[cj])
                            }))
                });
                if fail_safe {
                    self.mark_fail_safe(dft, gate_id, failed_work);
                } else if children
                    .iter()
                    .all(|&c| self.status[c] == ElementStatus::Failed)
                {
                    failed_work.push(gate_id);
                }
            }
            GateKind::Spare => {
                let Some(slot) = self.claims[gate_id] else {
                    return;
                };
                if self.status[children[slot]] == ElementStatus::Operational {
                    return;
                }
                match self.find_claimable(dft, gate_id, children) {
                    Some(next) => self.claims[gate_id] = Some(next),
                    None => {
                        self.claims[gate_id] = None;
                        failed_work.push(gate_id);
                    }
                }
            }
            // Sequence enforcers restrict event eligibility and never fail.
            GateKind::Seq => {}
        }
    }

    /// First child slot that is operational and not in use by another
    /// SPARE gate.
    fn find_claimable(
        &self,
        dft: &Dft,
        gate_id: ElementId,
        children: &[ElementId],
    ) -> Option<usize> {
        children.iter().enumerate().position(|(slot, &child)| {
            self.status[child] == ElementStatus::Operational
                && !self.claimed_elsewhere(dft, gate_id, child)
                && self.claims[gate_id] != Some(slot)
        })
    }

    fn claimed_elsewhere(&self, dft: &Dft, gate_id: ElementId, child: ElementId) -> bool {
        dft.elements().any(|e| {
            e.id != gate_id
                && match (&e.kind, self.claims[e.id]) {
                    (ElementKind::Gate(g), Some(slot)) => {
                        g.kind == GateKind::Spare && g.children[slot] == child
                    }
                    _ => false,
                }
        })
    }

    fn mark_fail_safe(&mut self, dft: &Dft, id: ElementId, failed_work: &mut Vec<ElementId>) {
        if self.status[id] != ElementStatus::Operational {
            return;
        }
        self.status[id] = ElementStatus::FailSafe;
        for &parent in dft.parents(id) {
            self.reevaluate(dft, parent, failed_work);
        }
    }

    /// Which elements are currently active (full failure rate).
    ///
    /// Module roots are the top element and every parentless non-dependency
    /// element; SPARE gates extend activation only into their currently
    /// claimed child.
    pub fn compute_activation(&self, dft: &Dft) -> Vec<bool> {
        let mut active = vec![false; dft.len()];
        let mut stack = vec![dft.top()];
        for element in dft.elements() {
            if !element.is_dependency()
                && dft.parents(element.id).is_empty()
                && element.id != dft.top()
            {
                stack.push(element.id);
            }
        }
        while let Some(id) = stack.pop() {
            if active[id] {
                continue;
            }
            active[id] = true;
            if let ElementKind::Gate(gate) = &dft.element(id).kind {
                if gate.kind == GateKind::Spare {
                    if let Some(slot) = self.claims[id] {
                        stack.push(gate.children[slot]);
                    }
                } else {
                    for &child in &gate.children {
                        stack.push(child);
                    }
                }
            }
        }
        active
    }

    /// Every basic event that can fail next, with its effective rate in
    /// this configuration.
    pub fn eligible_events(&self, dft: &Dft) -> Vec<(ElementId, f64)> {
        let active = self.compute_activation(dft);
        let mut events = Vec::new();
        for element in dft.basic_events() {
            if self.status[element.id] != ElementStatus::Operational {
                continue;
            }
            let Some(be) = element.as_basic() else {
                continue;
            };
            let FailureDistribution::Exponential { rate, dormancy } = be.distribution else {
                continue;
            };
            if !self.seq_allows(dft, element.id) {
                continue;
            }
            let effective = if active[element.id] {
                rate
            } else {
                rate * dormancy
            };
            if effective > 0.0 {
                events.push((element.id, effective));
            }
        }
        events
    }

    /// A basic event may fail only once every earlier child of each of its
    /// enclosing SEQ gates has failed.
    fn seq_allows(&self, dft: &Dft, event: ElementId) -> bool {
        dft.seq_constraints(event).iter().all(|&(seq, slot)| {
            let ElementKind::Gate(gate) = &dft.element(seq).kind else {
                return true;
            };
            gate.children[..slot]
                .iter()
                .all(|&earlier| self.status[earlier] == ElementStatus::Failed)
        })
    }

    /// Stable byte encoding: statuses, stamps of order-tracked elements,
    /// claim slots of SPARE gates. Equal encodings mean equal states.
    pub fn encode(&self, dft: &Dft) -> Vec<u8> {
        let mut out = Vec::with_capacity(dft.len() * 2);
        for id in 0..dft.len() {
            out.push(match self.status[id] {
                ElementStatus::Operational => 0,
                ElementStatus::Failed => 1,
                ElementStatus::FailSafe => 2,
            });
        }
        for id in 0..dft.len() {
            if dft.is_order_tracked(id) {
                out.extend_from_slice(&self.stamp[id].to_le_bytes());
            }
        }
        for element in dft.elements() {
            if let ElementKind::Gate(gate) = &element.kind {
                if gate.kind == GateKind::Spare {
                    out.push(match self.claims[element.id] {
                        Some(slot) => slot as u8 + 1,
                        None => 0,
                    });
                }
            }
        }
        out
    }
}
