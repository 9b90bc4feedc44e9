use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
///
/// `Unknown` carries the backend's reason (typically a timeout) and must be
/// surfaced to callers as-is; it is never coerced to a definitive verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability of the asserted constraints.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::io;

    /// Scripted solver for exercising callers without a real backend.
    pub struct MockSolver {
        pub results: Vec<SatResult>,
        pub checks: usize,
    }

    impl MockSolver {
        pub fn new(results: Vec<SatResult>) -> Self {
            Self { results, checks: 0 }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(&mut self, _name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
            Ok(())
        }

        fn assert(&mut self, _term: &SmtTerm) -> Result<(), Self::Error> {
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            let result = self
                .results
                .get(self.checks)
                .cloned()
                .unwrap_or(SatResult::Unsat);
            self.checks += 1;
            Ok(result)
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn mock_solver_replays_scripted_results() {
        let mut solver = MockSolver::new(vec![SatResult::Sat, SatResult::Unknown("slow".into())]);
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(
            solver.check_sat().unwrap(),
            SatResult::Unknown("slow".into())
        );
        // exhausted scripts default to unsat
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }
}
