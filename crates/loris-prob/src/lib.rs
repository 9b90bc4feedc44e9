#![doc = include_str!("../README.md")]

pub mod absorption;

pub use absorption::{expected_hitting_time, reachability_probability, NumericsError};
