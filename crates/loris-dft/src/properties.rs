//! Reliability properties checked against the generated chain.
//!
//! The textual property language and its parser live outside this crate;
//! callers hand over already-structured properties. The variant set is
//! closed on purpose: each property maps to exactly one numeric query on
//! the chain, and exhaustive matching keeps the pipeline honest about
//! which queries it supports.

use std::fmt;

/// The pseudo-label standing for "the whole tree has failed".
///
/// It resolves to the top-level element during relevant-events analysis
/// and is attached to every state in which the top element is failed.
pub const FAILED_LABEL: &str = "failed";

/// A quantitative reliability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    /// Probability of eventually reaching a state carrying `label`.
    EventuallyFailed { label: String },
    /// Probability of never reaching a state carrying `label`; the
    /// complement of [`Property::EventuallyFailed`].
    NeverFails { label: String },
    /// Expected time until a state carrying `label` is first entered
    /// (mean time to failure when `label` is [`FAILED_LABEL`]).
    ExpectedTimeToFailure { label: String },
}

impl Property {
    /// Probability that the whole tree eventually fails.
    pub fn tree_failure_probability() -> Self {
        Property::EventuallyFailed {
            label: FAILED_LABEL.to_string(),
        }
    }

    /// Mean time to failure of the whole tree.
    pub fn tree_mttf() -> Self {
        Property::ExpectedTimeToFailure {
            label: FAILED_LABEL.to_string(),
        }
    }

    /// The atomic labels this property references.
    pub fn atoms(&self) -> Vec<&str> {
        match self {
            Property::EventuallyFailed { label }
            | Property::NeverFails { label }
            | Property::ExpectedTimeToFailure { label } => vec![label.as_str()],
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::EventuallyFailed { label } => write!(f, "P=? [ F \"{label}\" ]"),
            Property::NeverFails { label } => write!(f, "P=? [ G !\"{label}\" ]"),
            Property::ExpectedTimeToFailure { label } => write!(f, "T=? [ F \"{label}\" ]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms_expose_the_referenced_label() {
        let p = Property::EventuallyFailed {
            label: "pump".into(),
        };
        assert_eq!(p.atoms(), vec!["pump"]);
        assert_eq!(Property::tree_mttf().atoms(), vec![FAILED_LABEL]);
    }

    #[test]
    fn display_uses_the_conventional_query_syntax() {
        assert_eq!(
            Property::tree_failure_probability().to_string(),
            "P=? [ F \"failed\" ]"
        );
        assert_eq!(Property::tree_mttf().to_string(), "T=? [ F \"failed\" ]");
    }
}
