use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

/// A unique identifier for an element of the fault tree.
pub type ElementId = usize;

/// Failure-time distribution of a basic event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailureDistribution {
    /// Exponentially distributed failure time.
    ///
    /// `rate` applies while the event is active; while it is dormant (its
    /// spare module is not claimed) the effective rate is `rate * dormancy`.
    Exponential { rate: f64, dormancy: f64 },
    /// An event that is failed from the start, or can never fail.
    Constant { failed: bool },
}

impl FailureDistribution {
    /// Exponential distribution with full rate in both active and dormant mode.
    pub fn exponential(rate: f64) -> Self {
        FailureDistribution::Exponential {
            rate,
            dormancy: 1.0,
        }
    }
}

/// A basic event: a leaf component with a stochastic failure time.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicEvent {
    pub distribution: FailureDistribution,
}

/// The closed set of gate kinds.
///
/// Each variant defines how the gate's failure status derives from its
/// children's statuses and, for the order-sensitive kinds, from the order
/// in which the children failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Fails when all children have failed.
    And,
    /// Fails when any child has failed.
    Or,
    /// Fails when at least `threshold` children have failed.
    Vote { threshold: usize },
    /// Priority-AND: fails only when all children failed in left-to-right
    /// order; becomes fail-safe otherwise.
    Pand,
    /// Spare management: uses its first child, claims the next operational
    /// unclaimed child when the used one fails, fails when none is left.
    Spare,
    /// Sequence enforcer: constrains children to fail left-to-right and
    /// never fails itself.
    Seq,
}

impl GateKind {
    /// True for gate kinds whose semantics observe the failure order of
    /// their children.
    pub fn is_order_sensitive(&self) -> bool {
        matches!(self, GateKind::Pand | GateKind::Seq)
    }

    /// True for gate kinds whose children are semantically unordered.
    pub fn is_unordered(&self) -> bool {
        matches!(
            self,
            GateKind::And | GateKind::Or | GateKind::Vote { .. }
        )
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::And => write!(f, "and"),
            GateKind::Or => write!(f, "or"),
            GateKind::Vote { threshold } => write!(f, "vote({threshold})"),
            GateKind::Pand => write!(f, "pand"),
            GateKind::Spare => write!(f, "spare"),
            GateKind::Seq => write!(f, "seq"),
        }
    }
}

/// An internal node with an ordered child list.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub kind: GateKind,
    pub children: Vec<ElementId>,
}

/// A functional dependency: when `trigger` fails, every element in
/// `dependents` is forced to fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub trigger: ElementId,
    pub dependents: Vec<ElementId>,
}

/// The kind of a fault tree element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Basic(BasicEvent),
    Gate(Gate),
    Dependency(Dependency),
}

/// One element of the fault tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub kind: ElementKind,
}

impl Element {
    pub fn is_basic(&self) -> bool {
        matches!(self.kind, ElementKind::Basic(_))
    }

    pub fn is_gate(&self) -> bool {
        matches!(self.kind, ElementKind::Gate(_))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self.kind, ElementKind::Dependency(_))
    }

    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            ElementKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicEvent> {
        match &self.kind {
            ElementKind::Basic(be) => Some(be),
            _ => None,
        }
    }

    pub fn as_dependency(&self) -> Option<&Dependency> {
        match &self.kind {
            ElementKind::Dependency(d) => Some(d),
            _ => None,
        }
    }
}

/// Errors raised while assembling a fault tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DftError {
    #[error("duplicate element name '{0}'")]
    DuplicateName(String),
    #[error("unknown element '{child}' referenced by '{referrer}'")]
    UnknownReference { referrer: String, child: String },
    #[error("unknown top-level element '{0}'")]
    UnknownTop(String),
    #[error("top-level element '{0}' is not a gate or basic event")]
    InvalidTop(String),
}

/// Incremental constructor for a [`Dft`].
///
/// Children are referenced by name so that elements can be declared in any
/// order; references are resolved when [`DftBuilder::build`] is called.
#[derive(Debug, Default)]
pub struct DftBuilder {
    defs: Vec<(String, RawKind)>,
    names: IndexMap<String, usize>,
}

#[derive(Debug)]
enum RawKind {
    Basic(FailureDistribution),
    Gate(GateKind, Vec<String>),
    Dependency { trigger: String, dependents: Vec<String> },
}

impl DftBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an exponentially distributed basic event.
    pub fn exponential(&mut self, name: &str, rate: f64, dormancy: f64) -> Result<(), DftError> {
        self.define(
            name,
            RawKind::Basic(FailureDistribution::Exponential { rate, dormancy }),
        )
    }

    /// Declare a constant-failed or constant-working basic event.
    pub fn constant(&mut self, name: &str, failed: bool) -> Result<(), DftError> {
        self.define(name, RawKind::Basic(FailureDistribution::Constant { failed }))
    }

    /// Declare a gate with the given children, in order.
    pub fn gate(&mut self, name: &str, kind: GateKind, children: &[&str]) -> Result<(), DftError> {
        self.define(
            name,
            RawKind::Gate(kind, children.iter().map(|c| c.to_string()).collect()),
        )
    }

    /// Declare a functional dependency.
    pub fn dependency(
        &mut self,
        name: &str,
        trigger: &str,
        dependents: &[&str],
    ) -> Result<(), DftError> {
        self.define(
            name,
            RawKind::Dependency {
                trigger: trigger.to_string(),
                dependents: dependents.iter().map(|d| d.to_string()).collect(),
            },
        )
    }

    fn define(&mut self, name: &str, kind: RawKind) -> Result<(), DftError> {
        if self.names.contains_key(name) {
            return Err(DftError::DuplicateName(name.to_string()));
        }
        self.names.insert(name.to_string(), self.defs.len());
        self.defs.push((name.to_string(), kind));
        Ok(())
    }

    /// Resolve all references and produce the immutable tree.
    pub fn build(self, top: &str) -> Result<Dft, DftError> {
        let resolve = |referrer: &str, child: &str| -> Result<ElementId, DftError> {
            self.names
                .get(child)
                .copied()
                .ok_or_else(|| DftError::UnknownReference {
                    referrer: referrer.to_string(),
                    child: child.to_string(),
                })
        };

        let mut elements = Vec::with_capacity(self.defs.len());
        for (id, (name, kind)) in self.defs.iter().enumerate() {
            let kind = match kind {
                RawKind::Basic(distribution) => ElementKind::Basic(BasicEvent {
                    distribution: distribution.clone(),
                }),
                RawKind::Gate(gate_kind, children) => {
                    let children = children
                        .iter()
                        .map(|c| resolve(name, c))
                        .collect::<Result<Vec<_>, _>>()?;
                    ElementKind::Gate(Gate {
                        kind: *gate_kind,
                        children,
                    })
                }
                RawKind::Dependency { trigger, dependents } => {
                    let trigger = resolve(name, trigger)?;
                    let dependents = dependents
                        .iter()
                        .map(|d| resolve(name, d))
                        .collect::<Result<Vec<_>, _>>()?;
                    ElementKind::Dependency(Dependency { trigger, dependents })
                }
            };
            elements.push(Element {
                id,
                name: name.clone(),
                kind,
            });
        }

        let top_id = self
            .names
            .get(top)
            .copied()
            .ok_or_else(|| DftError::UnknownTop(top.to_string()))?;
        if elements[top_id].is_dependency() {
            return Err(DftError::InvalidTop(top.to_string()));
        }

        Ok(Dft::assemble(elements, top_id, self.names))
    }
}

/// An immutable dynamic fault tree.
///
/// Derived indices (parents, order tracking, sequence constraints, trigger
/// map) are computed once at construction and reused by every analysis.
#[derive(Debug, Clone)]
pub struct Dft {
    elements: Vec<Element>,
    top: ElementId,
    name_index: IndexMap<String, ElementId>,
    /// Gate parents of each element (gate-child edges only).
    parents: Vec<Vec<ElementId>>,
    /// Elements whose failure order is observed by some PAND or SEQ gate.
    order_tracked: Vec<bool>,
    /// For each element, the dependencies it triggers when it fails.
    triggered_by: Vec<Vec<ElementId>>,
    /// For each basic event, the sequence constraints it is subject to:
    /// `(seq gate, child slot the event lives under)`.
    seq_constraints: Vec<Vec<(ElementId, usize)>>,
}

impl Dft {
    fn assemble(elements: Vec<Element>, top: ElementId, name_index: IndexMap<String, ElementId>) -> Self {
        let n = elements.len();
        let mut parents = vec![Vec::new(); n];
        let mut order_tracked = vec![false; n];
        let mut triggered_by = vec![Vec::new(); n];

        for element in &elements {
            match &element.kind {
                ElementKind::Gate(gate) => {
                    for &child in &gate.children {
                        parents[child].push(element.id);
                        if gate.kind.is_order_sensitive() {
                            order_tracked[child] = true;
                        }
                    }
                }
                ElementKind::Dependency(dep) => {
                    triggered_by[dep.trigger].push(element.id);
                }
                ElementKind::Basic(_) => {}
            }
        }

        let dft = Dft {
            elements,
            top,
            name_index,
            parents,
            order_tracked,
            triggered_by,
            seq_constraints: vec![Vec::new(); n],
        };

        // Sequence constraints need subtree membership, which needs the
        // assembled element list.
        let mut seq_constraints = vec![Vec::new(); n];
        for element in &dft.elements {
            if let ElementKind::Gate(gate) = &element.kind {
                if gate.kind == GateKind::Seq {
                    for (slot, &child) in gate.children.iter().enumerate() {
                        for member in dft.subtree(child) {
                            if dft.elements[member].is_basic() {
                                seq_constraints[member].push((element.id, slot));
                            }
                        }
                    }
                }
            }
        }

        Dft {
            seq_constraints,
            ..dft
        }
    }

    pub fn top(&self) -> ElementId {
        self.top
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn basic_events(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_basic())
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_dependency())
    }

    pub fn element_id(&self, name: &str) -> Option<ElementId> {
        self.name_index.get(name).copied()
    }

    pub fn name(&self, id: ElementId) -> &str {
        &self.elements[id].name
    }

    /// Gate parents of `id` (dependency edges excluded).
    pub fn parents(&self, id: ElementId) -> &[ElementId] {
        &self.parents[id]
    }

    /// Whether some PAND or SEQ gate observes the failure order of `id`.
    pub fn is_order_tracked(&self, id: ElementId) -> bool {
        self.order_tracked[id]
    }

    /// Dependencies triggered by the failure of `id`.
    pub fn dependencies_triggered_by(&self, id: ElementId) -> &[ElementId] {
        &self.triggered_by[id]
    }

    /// Sequence constraints binding the basic event `id`.
    pub fn seq_constraints(&self, id: ElementId) -> &[(ElementId, usize)] {
        &self.seq_constraints[id]
    }

    /// All elements of the subtree rooted at `root`, following gate-child
    /// edges only, in depth-first discovery order.
    pub fn subtree(&self, root: ElementId) -> Vec<ElementId> {
        let mut seen = vec![false; self.elements.len()];
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if seen[id] {
                continue;
            }
            seen[id] = true;
            out.push(id);
            if let ElementKind::Gate(gate) = &self.elements[id].kind {
                for &child in gate.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }
}

impl fmt::Display for Dft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dynamic fault tree (top: {}):", self.name(self.top))?;
        for element in &self.elements {
            match &element.kind {
                ElementKind::Basic(be) => match &be.distribution {
                    FailureDistribution::Exponential { rate, dormancy } => {
                        writeln!(
                            f,
                            "  e{}: {} be(rate={rate}, dormancy={dormancy})",
                            element.id, element.name
                        )?;
                    }
                    FailureDistribution::Constant { failed } => {
                        writeln!(f, "  e{}: {} const({failed})", element.id, element.name)?;
                    }
                },
                ElementKind::Gate(gate) => {
                    let children = gate
                        .children
                        .iter()
                        .map(|c| format!("e{c}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(
                        f,
                        "  e{}: {} {}[{children}]",
                        element.id, element.name, gate.kind
                    )?;
                }
                ElementKind::Dependency(dep) => {
                    let dependents = dep
                        .dependents
                        .iter()
                        .map(|d| format!("e{d}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(
                        f,
                        "  e{}: {} fdep(e{} -> {dependents})",
                        element.id, element.name, dep.trigger
                    )?;
                }
            }
        }
        Ok(())
    }
}
