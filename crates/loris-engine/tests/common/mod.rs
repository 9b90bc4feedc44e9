//! Shared scenario trees for the integration tests.
#![allow(dead_code)]

use loris_dft::model::{Dft, DftBuilder, GateKind};

/// AND over `n` independent rate-1 events.
pub fn and_of(n: usize) -> Dft {
    gate_of(GateKind::And, n, 1.0)
}

/// A single gate over `n` rate-`rate` events.
pub fn gate_of(kind: GateKind, n: usize, rate: f64) -> Dft {
    let mut b = DftBuilder::new();
    let names: Vec<String> = (0..n).map(|i| format!("be{i}")).collect();
    for name in &names {
        b.exponential(name, rate, 1.0).unwrap();
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    b.gate("top", kind, &refs).unwrap();
    b.build("top").unwrap()
}

/// AND of two events forced by a common trigger through one non-binary
/// dependency.
pub fn fdep_fanout() -> Dft {
    let mut b = DftBuilder::new();
    b.exponential("t", 1.0, 1.0).unwrap();
    b.exponential("a", 1.0, 1.0).unwrap();
    b.exponential("b", 1.0, 1.0).unwrap();
    b.gate("top", GateKind::And, &["a", "b"]).unwrap();
    b.dependency("f", "t", &["a", "b"]).unwrap();
    b.build("top").unwrap()
}

/// Cold spare: active primary, dormant backup that only runs (and only
/// fails) once claimed.
pub fn cold_spare() -> Dft {
    let mut b = DftBuilder::new();
    b.exponential("primary", 1.0, 1.0).unwrap();
    b.exponential("backup", 1.0, 0.0).unwrap();
    b.gate("top", GateKind::Spare, &["primary", "backup"]).unwrap();
    b.build("top").unwrap()
}

/// Two dependencies on one trigger racing into a PAND.
pub fn racing_pand() -> Dft {
    let mut b = DftBuilder::new();
    b.exponential("t", 1.0, 1.0).unwrap();
    b.exponential("a", 1.0, 1.0).unwrap();
    b.exponential("b", 1.0, 1.0).unwrap();
    b.gate("top", GateKind::Pand, &["a", "b"]).unwrap();
    b.dependency("f1", "t", &["a"]).unwrap();
    b.dependency("f2", "t", &["b"]).unwrap();
    b.build("top").unwrap()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
