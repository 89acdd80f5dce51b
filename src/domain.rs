use std::fmt::Debug;

use crate::lit::Lit;
use crate::solver::{Model, Solver};

/// One-hot encoded variable over a finite domain.
///
/// Creation emits the exactly-one constraint over the value literals.
/// Asking for a value outside the domain yields the solver's constant-false
/// literal, so clauses mentioning impossible values simplify away.
#[derive(Debug, Clone)]
pub struct DomainVar<T> {
    domain: Vec<T>,
    lits: Vec<Lit>,
    false_lit: Lit,
}

impl<T> DomainVar<T>
where
    T: Copy + Eq + Debug,
{
    pub fn new<I>(solver: &mut Solver, domain: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let domain: Vec<T> = domain.into_iter().collect();
        assert!(!domain.is_empty(), "Domain should not be empty");
        let lits = solver.new_vars(domain.len());
        solver.exactly_one(&lits);
        Self {
            domain,
            lits,
            false_lit: solver.false_lit(),
        }
    }

    pub fn domain(&self) -> &[T] {
        &self.domain
    }

    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    /// Literal denoting `self == value`.
    pub fn eq(&self, value: T) -> Lit {
        match self.domain.iter().position(|&x| x == value) {
            Some(i) => self.lits[i],
            None => self.false_lit,
        }
    }

    /// Literal denoting `self != value`.
    pub fn neq(&self, value: T) -> Lit {
        -self.eq(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (T, Lit)> + '_ {
        self.domain.iter().copied().zip(self.lits.iter().copied())
    }

    /// Decode the value of the variable under the model.
    pub fn decode(&self, model: &Model) -> T {
        let mut values = self.iter().filter(|&(_, lit)| model.value(lit)).map(|(value, _)| value);
        let value = values.next();
        assert!(values.next().is_none(), "More than one value is set in {:?}", self.domain);
        match value {
            Some(value) => value,
            None => panic!("No value is set in {:?}", self.domain),
        }
    }

    /// Number of value literals that are true under the model.
    pub fn count_true(&self, model: &Model) -> usize {
        self.lits.iter().filter(|&&lit| model.value(lit)).count()
    }
}
