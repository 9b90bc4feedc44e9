//! Rewrites a fault tree into the normal form downstream analyses expect.
//!
//! The input tree is never mutated; a transform produces a fresh,
//! independent [`Dft`].

use crate::model::{Dft, DftBuilder, ElementKind, FailureDistribution};
use thiserror::Error;

/// Which normalizations to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// Split every dependency with more than one dependent into a fan-out
    /// of strictly binary dependencies on the same trigger.
    pub binary_fdeps: bool,
    /// Give every additional gate reference to a shared constant basic
    /// event its own freshly named copy, so symmetry and approximation
    /// code never has to reason about aliased constants.
    pub unique_constant_be: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            binary_fdeps: true,
            unique_constant_be: true,
        }
    }
}

/// Failure to apply a requested transform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("unsupported construct at '{element}': {reason}")]
    UnsupportedConstruct { element: String, reason: String },
    #[error("transformed tree failed to assemble: {0}")]
    Assembly(#[from] crate::model::DftError),
}

/// Apply the requested normalizations, producing a new tree.
pub fn transform(dft: &Dft, options: &TransformOptions) -> Result<Dft, TransformError> {
    let mut names = NameSupply::new(dft);
    let mut builder = DftBuilder::new();

    // Copies of shared constants, created on demand per extra reference.
    let mut constant_uses: Vec<usize> = vec![0; dft.len()];

    for element in dft.elements() {
        match &element.kind {
            ElementKind::Basic(be) => match be.distribution {
                FailureDistribution::Exponential { rate, dormancy } => {
                    builder.exponential(&element.name, rate, dormancy)?;
                }
                FailureDistribution::Constant { failed } => {
                    builder.constant(&element.name, failed)?;
                }
            },
            ElementKind::Gate(gate) => {
                let mut children = Vec::with_capacity(gate.children.len());
                for &child in &gate.children {
                    let shared_constant = match constant_value(dft, child) {
                        Some(failed) if options.unique_constant_be => {
                            constant_uses[child] += 1;
                            (constant_uses[child] > 1).then_some(failed)
                        }
                        _ => None,
                    };
                    if let Some(failed) = shared_constant {
                        if dft.dependencies().any(|d| dependency_touches(d, child)) {
                            return Err(TransformError::UnsupportedConstruct {
                                element: dft.name(child).to_string(),
                                reason: "shared constant is wired into a dependency; \
                                         copying it would change trigger semantics"
                                    .to_string(),
                            });
                        }
                        let copy = names.fresh(dft.name(child));
                        builder.constant(&copy, failed)?;
                        children.push(copy);
                    } else {
                        children.push(dft.name(child).to_string());
                    }
                }
                let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
                builder.gate(&element.name, gate.kind, &child_refs)?;
            }
            ElementKind::Dependency(dep) => {
                let trigger = dft.name(dep.trigger);
                if options.binary_fdeps && dep.dependents.len() > 1 {
                    for &dependent in &dep.dependents {
                        let split = names.fresh(&element.name);
                        builder.dependency(&split, trigger, &[dft.name(dependent)])?;
                    }
                } else {
                    let dependents: Vec<&str> =
                        dep.dependents.iter().map(|&d| dft.name(d)).collect();
                    builder.dependency(&element.name, trigger, &dependents)?;
                }
            }
        }
    }

    Ok(builder.build(dft.name(dft.top()))?)
}

fn constant_value(dft: &Dft, id: usize) -> Option<bool> {
    match &dft.element(id).kind {
        ElementKind::Basic(be) => match be.distribution {
            FailureDistribution::Constant { failed } => Some(failed),
            FailureDistribution::Exponential { .. } => None,
        },
        _ => None,
    }
}

fn dependency_touches(element: &crate::model::Element, id: usize) -> bool {
    match &element.kind {
        ElementKind::Dependency(dep) => dep.trigger == id || dep.dependents.contains(&id),
        _ => false,
    }
}

/// Derives fresh element names that cannot collide with existing ones.
struct NameSupply {
    taken: indexmap::IndexSet<String>,
}

impl NameSupply {
    fn new(dft: &Dft) -> Self {
        Self {
            taken: dft.elements().map(|e| e.name.clone()).collect(),
        }
    }

    fn fresh(&mut self, base: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
