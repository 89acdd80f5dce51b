//! Cardinality constraints via totalizers.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};

use log::debug;

use crate::error::{Error, Result};
use crate::lit::Lit;
use crate::solver::Solver;

/// Upper bound on a count.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Bound {
    #[default]
    Unbounded,
    AtMost(usize),
}

impl Bound {
    pub fn limit(self) -> Option<usize> {
        match self {
            Bound::Unbounded => None,
            Bound::AtMost(n) => Some(n),
        }
    }

    /// Whether `self` allows no more than `other` does.
    pub fn is_tighter_or_equal(self, other: Bound) -> bool {
        match (self, other) {
            (_, Bound::Unbounded) => true,
            (Bound::Unbounded, Bound::AtMost(_)) => false,
            (Bound::AtMost(a), Bound::AtMost(b)) => a <= b,
        }
    }
}

impl From<Option<usize>> for Bound {
    fn from(value: Option<usize>) -> Self {
        match value {
            None => Bound::Unbounded,
            Some(n) => Bound::AtMost(n),
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Unbounded => write!(f, "∞"),
            Bound::AtMost(n) => write!(f, "{}", n),
        }
    }
}

/// Totalizer over a set of input literals.
///
/// `totalizer[i - 1]` holds iff at least `i` inputs are true. The upper bound
/// can be declared permanently (comparator clauses, only ever tightened) or
/// assumed per solve call (a single assumption literal, freely changed).
#[derive(Debug, Clone)]
pub struct Cardinality {
    totalizer: Vec<Lit>,
    declared: Bound,
    assumed: Bound,
}

impl Cardinality {
    pub fn new<I>(solver: &mut Solver, inputs: I) -> Self
    where
        I: IntoIterator<Item = Lit>,
    {
        let inputs: Vec<Lit> = inputs.into_iter().collect();
        debug!("Declaring totalizer over {} inputs", inputs.len());
        let totalizer = declare_totalizer(solver, inputs);
        Self {
            totalizer,
            declared: Bound::Unbounded,
            assumed: Bound::Unbounded,
        }
    }

    pub fn len(&self) -> usize {
        self.totalizer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totalizer.is_empty()
    }

    pub fn totalizer(&self) -> &[Lit] {
        &self.totalizer
    }

    /// Literal denoting "at least `n` inputs are true", for `1 <= n <= len`.
    pub fn at_least(&self, n: usize) -> Lit {
        assert!(n >= 1 && n <= self.totalizer.len(), "Bad totalizer index {}", n);
        self.totalizer[n - 1]
    }

    pub fn declared_bound(&self) -> Bound {
        self.declared
    }

    pub fn assumed_bound(&self) -> Bound {
        self.assumed
    }

    /// Permanently constrain the count to `<= bound`.
    ///
    /// Fails with [`Error::BoundLoosening`] if `bound` is looser than an
    /// already declared bound.
    pub fn update_upper_bound_less_than_or_equal(&mut self, solver: &mut Solver, bound: Bound) -> Result<()> {
        if !bound.is_tighter_or_equal(self.declared) {
            return Err(Error::BoundLoosening {
                old: self.declared,
                new: bound,
            });
        }
        if let Bound::AtMost(ub) = bound {
            let max = match self.declared {
                Bound::Unbounded => self.totalizer.len(),
                Bound::AtMost(old) => old.min(self.totalizer.len()),
            };
            for i in (ub + 1)..=max {
                solver.add_clause([-self.totalizer[i - 1]]);
            }
        }
        self.declared = bound;
        Ok(())
    }

    /// Permanently constrain the count to `< n`.
    pub fn update_upper_bound_less_than(&mut self, solver: &mut Solver, n: usize) -> Result<()> {
        match n.checked_sub(1) {
            Some(ub) => self.update_upper_bound_less_than_or_equal(solver, Bound::AtMost(ub)),
            None => {
                solver.add_clause(std::iter::empty());
                Ok(())
            }
        }
    }

    /// Set the bound used as an assumption in subsequent solve calls.
    pub fn assume_upper_bound_less_than_or_equal(&mut self, bound: Bound) {
        self.assumed = bound;
    }

    /// Constrain the count either permanently or by assumption.
    pub fn set_upper_bound(&mut self, solver: &mut Solver, bound: Bound, use_assumptions: bool) -> Result<()> {
        if use_assumptions {
            self.assume_upper_bound_less_than_or_equal(bound);
            Ok(())
        } else {
            self.update_upper_bound_less_than_or_equal(solver, bound)
        }
    }

    /// Assumption literals implementing the assumed bound.
    pub fn assumptions(&self) -> Vec<Lit> {
        match self.assumed {
            Bound::AtMost(ub) if ub < self.totalizer.len() => vec![-self.totalizer[ub]],
            _ => vec![],
        }
    }
}

fn declare_totalizer(solver: &mut Solver, inputs: Vec<Lit>) -> Vec<Lit> {
    let mut queue: VecDeque<Vec<Lit>> = inputs.into_iter().map(|x| vec![x]).collect();
    while queue.len() > 1 {
        let (Some(a), Some(b)) = (queue.pop_front(), queue.pop_front()) else {
            unreachable!()
        };
        let r = solver.new_vars(a.len() + b.len());
        for i in 0..=a.len() {
            for j in 0..=b.len() {
                // a >= i and b >= j implies r >= i + j
                if i + j > 0 {
                    let mut clause = vec![r[i + j - 1]];
                    if i > 0 {
                        clause.push(-a[i - 1]);
                    }
                    if j > 0 {
                        clause.push(-b[j - 1]);
                    }
                    solver.add_clause(clause);
                }
                // a < i + 1 and b < j + 1 implies r < i + j + 1
                if i + j < r.len() {
                    let mut clause = vec![-r[i + j]];
                    if i < a.len() {
                        clause.push(a[i]);
                    }
                    if j < b.len() {
                        clause.push(b[j]);
                    }
                    solver.add_clause(clause);
                }
            }
        }
        queue.push_back(r);
    }
    queue.pop_front().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn count(model: &crate::solver::Model, lits: &[Lit]) -> usize {
        lits.iter().filter(|&&x| model.value(x)).count()
    }

    #[test]
    fn test_totalizer_counts() {
        let mut solver = Solver::varisat();
        let xs = solver.new_vars(5);
        let card = Cardinality::new(&mut solver, xs.clone());
        assert_eq!(card.len(), 5);

        // Force exactly 3 inputs true and check the unary output.
        let model = solver.solve(&[xs[0], xs[2], xs[4], -xs[1], -xs[3]]).unwrap().unwrap();
        for n in 1..=5 {
            println!("at_least({}) = {}", n, model.value(card.at_least(n)));
            assert_eq!(model.value(card.at_least(n)), n <= 3);
        }
    }

    #[test]
    fn test_assumed_bound() {
        let mut solver = Solver::varisat();
        let xs = solver.new_vars(4);
        solver.add_clause([xs[0]]);
        solver.add_clause([xs[1]]);
        let mut card = Cardinality::new(&mut solver, xs.clone());

        card.assume_upper_bound_less_than_or_equal(Bound::AtMost(1));
        assert!(solver.solve(&card.assumptions()).unwrap().is_none());

        card.assume_upper_bound_less_than_or_equal(Bound::AtMost(2));
        let model = solver.solve(&card.assumptions()).unwrap().unwrap();
        assert_eq!(count(&model, &xs), 2);

        card.assume_upper_bound_less_than_or_equal(Bound::Unbounded);
        assert!(card.assumptions().is_empty());
        assert!(solver.solve(&[xs[2], xs[3]]).unwrap().is_some());
    }

    #[test]
    fn test_declared_bound_refuses_loosening() {
        let mut solver = Solver::varisat();
        let xs = solver.new_vars(3);
        let mut card = Cardinality::new(&mut solver, xs.clone());

        card.update_upper_bound_less_than_or_equal(&mut solver, Bound::AtMost(2)).unwrap();
        assert!(solver.solve(&xs).unwrap().is_none());
        card.update_upper_bound_less_than(&mut solver, 2).unwrap();
        assert_eq!(card.declared_bound(), Bound::AtMost(1));
        assert!(solver.solve(&[xs[0], xs[1]]).unwrap().is_none());

        let result = card.update_upper_bound_less_than_or_equal(&mut solver, Bound::AtMost(2));
        assert!(matches!(result, Err(Error::BoundLoosening { .. })));
        let result = card.update_upper_bound_less_than_or_equal(&mut solver, Bound::Unbounded);
        assert!(matches!(result, Err(Error::BoundLoosening { .. })));
    }

    #[test]
    fn test_bound_order() {
        assert!(Bound::AtMost(3).is_tighter_or_equal(Bound::Unbounded));
        assert!(Bound::AtMost(3).is_tighter_or_equal(Bound::AtMost(3)));
        assert!(!Bound::AtMost(4).is_tighter_or_equal(Bound::AtMost(3)));
        assert!(!Bound::Unbounded.is_tighter_or_equal(Bound::AtMost(0)));
        assert_eq!(Bound::from(Some(2)), Bound::AtMost(2));
        assert_eq!(Bound::AtMost(5).to_string(), "5");
    }
}
