#![doc = include_str!("../README.md")]

//! SMT terms, solver abstraction, Z3 backend, and the fault tree
//! structure encoder.

pub mod backends;
pub mod encoder;
pub mod solver;
pub mod sorts;
pub mod terms;
