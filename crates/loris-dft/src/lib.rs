#![doc = include_str!("../README.md")]

//! Dynamic fault tree model and structural analyses.
//!
//! This crate defines the immutable DFT element arena, the runtime failure
//! state with bottom-up propagation, the well-formedness checker, the
//! normalizing transformer, the symmetry detector, the relevant-events
//! analyzer, and the property type.

pub mod model;
pub mod properties;
pub mod relevance;
pub mod state;
pub mod symmetry;
pub mod transform;
pub mod wellformed;
