/// Abstract SMT term, solver-agnostic.
///
/// Only the fragment the fault tree encodings use: boolean structure plus
/// linear integer counting for voting thresholds.
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Boolean literal.
    BoolLit(bool),
    /// Integer literal.
    IntLit(i64),

    // Boolean structure
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),
    Eq(Box<SmtTerm>, Box<SmtTerm>),

    // Counting
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn ite(self, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(self), Box::new(then), Box::new(els))
    }

    /// `sum(ite(t, 1, 0) for t in terms)` — the standard cardinality
    /// encoding for voting gates.
    pub fn count_true(terms: Vec<SmtTerm>) -> Self {
        let mut acc = SmtTerm::int(0);
        for term in terms {
            acc = acc.add(term.ite(SmtTerm::int(1), SmtTerm::int(0)));
        }
        acc
    }
}
