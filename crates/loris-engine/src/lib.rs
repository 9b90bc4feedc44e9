#![doc = include_str!("../README.md")]

//! Fault tree analysis engine.
//!
//! This crate orchestrates the full analysis pipeline: normalization,
//! symmetry detection, relevant-events pruning, explicit state-space
//! generation, dependency-conflict certification, and measure checking.

pub mod builder;
pub mod conflicts;
pub mod ctmc;
pub mod pipeline;
pub mod registry;
pub mod result;
