//! Determines which events must be tracked with full label fidelity.
//!
//! An event outside the relevant set may still shape which states are
//! reachable, but the builder is free to omit it from per-state labels and
//! to stop exploring once every relevant status is decided — the mechanism
//! that keeps chains compact for narrow queries.

use crate::model::{Dft, ElementId};
use crate::properties::{Property, FAILED_LABEL};
use indexmap::IndexSet;
use thiserror::Error;

/// The set of element names that must be exposed as state labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevantEvents {
    all: bool,
    names: IndexSet<String>,
    ids: IndexSet<ElementId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelevanceError {
    #[error("property references unknown element '{0}'")]
    UnknownLabel(String),
}

impl RelevantEvents {
    /// Mark every element relevant (full-fidelity labeling).
    pub fn all(dft: &Dft) -> Self {
        RelevantEvents {
            all: true,
            names: dft.elements().map(|e| e.name.clone()).collect(),
            ids: (0..dft.len()).collect(),
        }
    }

    pub fn is_relevant(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }

    pub fn is_relevant_id(&self, id: ElementId) -> bool {
        self.all || self.ids.contains(&id)
    }

    /// Whether every element is tracked.
    pub fn is_all(&self) -> bool {
        self.all
    }

    /// Ids of the relevant elements, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.ids.iter().copied()
    }

    /// Names of the relevant elements, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Resolve the labels referenced by `properties` (plus `extra_names`) to
/// elements of the tree.
///
/// The pseudo-label [`FAILED_LABEL`] always resolves to the top-level
/// element; every other label must name an element.
pub fn compute_relevant_events(
    dft: &Dft,
    properties: &[Property],
    extra_names: &[String],
) -> Result<RelevantEvents, RelevanceError> {
    let mut names = IndexSet::new();
    let mut ids = IndexSet::new();

    let mut add = |label: &str| -> Result<(), RelevanceError> {
        let id = if label == FAILED_LABEL {
            dft.top()
        } else {
            dft.element_id(label)
                .ok_or_else(|| RelevanceError::UnknownLabel(label.to_string()))?
        };
        names.insert(dft.name(id).to_string());
        ids.insert(id);
        Ok(())
    };

    for property in properties {
        for atom in property.atoms() {
            add(atom)?;
        }
    }
    for name in extra_names {
        add(name)?;
    }

    Ok(RelevantEvents {
        all: false,
        names,
        ids,
    })
}
