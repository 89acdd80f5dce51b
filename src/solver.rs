//! Incremental SAT solving.
//!
//! The encoders talk to a [`Solver`], which wraps an incremental [`Backend`]
//! and offers the clause combinators used throughout the reductions
//! (`imply`, `iff_and`, `imply_iff`, `at_most_one`, ...).
//!
//! The solver allocates one constant-true variable up front. Literals that
//! denote an impossible domain value are mapped to its negation (see
//! [`Solver::false_lit`]), and clauses are simplified against it: satisfied
//! clauses are dropped, false literals are removed.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::lit::Lit;
use crate::multiarray::MultiArray;

/// Incremental SAT backend.
pub trait Backend {
    /// Allocate a fresh variable and return its positive literal.
    fn new_var(&mut self) -> Lit;

    fn add_clause(&mut self, lits: &[Lit]);

    /// Solve under the given assumptions.
    /// Returns `Ok(None)` if the formula is unsatisfiable under them.
    fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Model>>;

    fn num_vars(&self) -> usize;
}

/// [`Backend`] implemented on top of the `varisat` CDCL solver.
pub struct VarisatBackend {
    inner: varisat::Solver<'static>,
    num_vars: usize,
}

impl VarisatBackend {
    pub fn new() -> Self {
        Self {
            inner: varisat::Solver::new(),
            num_vars: 0,
        }
    }

    fn to_varisat(lit: Lit) -> varisat::Lit {
        varisat::Lit::from_dimacs(lit.get() as isize)
    }
}

impl Default for VarisatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for VarisatBackend {
    fn new_var(&mut self) -> Lit {
        use varisat::ExtendFormula;

        let var = self.inner.new_var();
        self.num_vars += 1;
        debug_assert_eq!(var.to_dimacs() as usize, self.num_vars);
        Lit::positive(self.num_vars as u32)
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        use varisat::ExtendFormula;

        let clause: Vec<varisat::Lit> = lits.iter().copied().map(Self::to_varisat).collect();
        self.inner.add_clause(&clause);
    }

    fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Model>> {
        let assumptions: Vec<varisat::Lit> = assumptions.iter().copied().map(Self::to_varisat).collect();
        self.inner.assume(&assumptions);
        let is_sat = self.inner.solve().map_err(|e| Error::Backend(e.to_string()))?;
        if !is_sat {
            return Ok(None);
        }
        let model = self
            .inner
            .model()
            .ok_or_else(|| Error::Backend("solver reported SAT but returned no model".to_string()))?;
        let mut values = vec![false; self.num_vars + 1];
        for lit in model {
            let index = lit.var().index() + 1;
            if index < values.len() {
                values[index] = lit.is_positive();
            }
        }
        Ok(Some(Model::new(values)))
    }

    fn num_vars(&self) -> usize {
        self.num_vars
    }
}

/// Satisfying assignment, indexed by variable.
#[derive(Debug, Clone)]
pub struct Model {
    values: Vec<bool>,
}

impl Model {
    /// `values[0]` is unused.
    pub fn new(values: Vec<bool>) -> Self {
        Self { values }
    }

    pub fn value(&self, lit: Lit) -> bool {
        let value = self.values.get(lit.index()).copied().unwrap_or(false);
        value ^ lit.is_negated()
    }

    pub fn num_vars(&self) -> usize {
        self.values.len().saturating_sub(1)
    }
}

pub struct Solver {
    backend: Box<dyn Backend>,
    true_lit: Lit,
    num_clauses: usize,
}

impl Solver {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        let mut backend = backend;
        let true_lit = backend.new_var();
        backend.add_clause(&[true_lit]);
        Self {
            backend,
            true_lit,
            num_clauses: 0,
        }
    }

    pub fn varisat() -> Self {
        Self::new(Box::new(VarisatBackend::new()))
    }

    pub fn true_lit(&self) -> Lit {
        self.true_lit
    }

    pub fn false_lit(&self) -> Lit {
        -self.true_lit
    }

    pub fn num_vars(&self) -> usize {
        self.backend.num_vars()
    }

    /// Number of clauses added through [`Solver::add_clause`], after simplification.
    pub fn num_clauses(&self) -> usize {
        self.num_clauses
    }

    pub fn new_var(&mut self) -> Lit {
        self.backend.new_var()
    }

    pub fn new_vars(&mut self, n: usize) -> Vec<Lit> {
        (0..n).map(|_| self.new_var()).collect()
    }

    pub fn new_array<const N: usize>(&mut self, shape: [usize; N]) -> MultiArray<Lit, N> {
        MultiArray::new_with(shape, |_| self.new_var())
    }

    pub fn comment(&self, text: &str) {
        trace!("// {}", text);
    }

    pub fn add_clause<I>(&mut self, lits: I)
    where
        I: IntoIterator<Item = Lit>,
    {
        let mut clause = Vec::new();
        for lit in lits {
            if lit == self.true_lit {
                return;
            }
            if lit == -self.true_lit {
                continue;
            }
            clause.push(lit);
        }
        if clause.is_empty() {
            debug!("Adding an empty clause, the formula becomes UNSAT");
            clause.push(-self.true_lit);
        }
        self.backend.add_clause(&clause);
        self.num_clauses += 1;
    }

    /// Add `premises => OR(lits)`.
    fn add_clause_under(&mut self, premises: &[Lit], lits: &[Lit]) {
        self.add_clause(premises.iter().map(|&p| -p).chain(lits.iter().copied()));
    }

    pub fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Model>> {
        debug!(
            "Solving with {} vars, {} clauses and {} assumptions...",
            self.num_vars(),
            self.num_clauses,
            assumptions.len()
        );
        self.backend.solve(assumptions)
    }

    // Combinators.

    /// `a => b`
    pub fn imply(&mut self, a: Lit, b: Lit) {
        self.add_clause([-a, b]);
    }

    /// `a => AND(bs)`
    pub fn imply_and(&mut self, a: Lit, bs: &[Lit]) {
        for &b in bs {
            self.imply(a, b);
        }
    }

    /// `a => OR(bs)`
    pub fn imply_or(&mut self, a: Lit, bs: &[Lit]) {
        self.add_clause_under(&[a], bs);
    }

    /// `a => (b => c)`
    pub fn imply_imply(&mut self, a: Lit, b: Lit, c: Lit) {
        self.add_clause([-a, -b, c]);
    }

    /// `a <=> b`
    pub fn iff(&mut self, a: Lit, b: Lit) {
        self.imply(a, b);
        self.imply(b, a);
    }

    /// `x <=> AND(ys)`
    pub fn iff_and(&mut self, x: Lit, ys: &[Lit]) {
        self.iff_and_under(&[], x, ys);
    }

    /// `x <=> OR(ys)`
    pub fn iff_or(&mut self, x: Lit, ys: &[Lit]) {
        self.iff_or_under(&[], x, ys);
    }

    /// `a => (x <=> y)`
    pub fn imply_iff(&mut self, a: Lit, x: Lit, y: Lit) {
        self.add_clause_under(&[a, x], &[y]);
        self.add_clause_under(&[a, y], &[x]);
    }

    /// `a => (x <=> AND(ys))`
    pub fn imply_iff_and(&mut self, a: Lit, x: Lit, ys: &[Lit]) {
        self.iff_and_under(&[a], x, ys);
    }

    /// `a => (x <=> OR(ys))`
    pub fn imply_iff_or(&mut self, a: Lit, x: Lit, ys: &[Lit]) {
        self.iff_or_under(&[a], x, ys);
    }

    /// `a => (b => (x <=> y))`
    pub fn imply_imply_iff(&mut self, a: Lit, b: Lit, x: Lit, y: Lit) {
        self.add_clause_under(&[a, b, x], &[y]);
        self.add_clause_under(&[a, b, y], &[x]);
    }

    /// `a => (b => (x <=> AND(ys)))`
    pub fn imply_imply_iff_and(&mut self, a: Lit, b: Lit, x: Lit, ys: &[Lit]) {
        self.iff_and_under(&[a, b], x, ys);
    }

    /// `a => (b => (x <=> OR(ys)))`
    pub fn imply_imply_iff_or(&mut self, a: Lit, b: Lit, x: Lit, ys: &[Lit]) {
        self.iff_or_under(&[a, b], x, ys);
    }

    fn iff_and_under(&mut self, premises: &[Lit], x: Lit, ys: &[Lit]) {
        let mut premises_x = premises.to_vec();
        premises_x.push(x);
        for &y in ys {
            self.add_clause_under(&premises_x, &[y]);
        }
        let mut clause: Vec<Lit> = ys.iter().map(|&y| -y).collect();
        clause.push(x);
        self.add_clause_under(premises, &clause);
    }

    fn iff_or_under(&mut self, premises: &[Lit], x: Lit, ys: &[Lit]) {
        let mut premises_x = premises.to_vec();
        premises_x.push(x);
        self.add_clause_under(&premises_x, ys);
        for &y in ys {
            let mut premises_y = premises.to_vec();
            premises_y.push(y);
            self.add_clause_under(&premises_y, &[x]);
        }
    }

    /// Pairwise at-most-one.
    pub fn at_most_one(&mut self, lits: &[Lit]) {
        for (i, &a) in lits.iter().enumerate() {
            for &b in &lits[i + 1..] {
                self.add_clause([-a, -b]);
            }
        }
    }

    pub fn exactly_one(&mut self, lits: &[Lit]) {
        self.add_clause(lits.iter().copied());
        self.at_most_one(lits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_simple_sat() {
        let mut solver = Solver::varisat();
        let a = solver.new_var();
        let b = solver.new_var();
        solver.imply(a, b);
        solver.add_clause([a]);
        let model = solver.solve(&[]).unwrap().unwrap();
        assert!(model.value(a));
        assert!(model.value(b));
        assert!(!model.value(-b));
    }

    #[test]
    fn test_assumptions() {
        let mut solver = Solver::varisat();
        let a = solver.new_var();
        let b = solver.new_var();
        solver.iff(a, -b);
        assert!(solver.solve(&[a, b]).unwrap().is_none());
        let model = solver.solve(&[a]).unwrap().unwrap();
        assert!(!model.value(b));
        // Assumptions do not persist.
        assert!(solver.solve(&[b]).unwrap().is_some());
    }

    #[test]
    fn test_constant_simplification() {
        let mut solver = Solver::varisat();
        let a = solver.new_var();
        let t = solver.true_lit();
        let f = solver.false_lit();
        solver.add_clause([a, t]);
        assert_eq!(solver.num_clauses(), 0);
        solver.add_clause([a, f]);
        assert_eq!(solver.num_clauses(), 1);
        let model = solver.solve(&[]).unwrap().unwrap();
        assert!(model.value(a));
        solver.add_clause([f]);
        assert!(solver.solve(&[]).unwrap().is_none());
    }

    #[test]
    fn test_iff_and() {
        let mut solver = Solver::varisat();
        let x = solver.new_var();
        let ys = solver.new_vars(3);
        solver.iff_and(x, &ys);
        let model = solver.solve(&[x]).unwrap().unwrap();
        assert!(ys.iter().all(|&y| model.value(y)));
        let model = solver.solve(&[-ys[1]]).unwrap().unwrap();
        assert!(!model.value(x));
    }

    #[test]
    fn test_iff_or() {
        let mut solver = Solver::varisat();
        let x = solver.new_var();
        let ys = solver.new_vars(3);
        solver.iff_or(x, &ys);
        let model = solver.solve(&[-x]).unwrap().unwrap();
        assert!(ys.iter().all(|&y| !model.value(y)));
        let model = solver.solve(&[ys[2]]).unwrap().unwrap();
        assert!(model.value(x));
    }

    #[test]
    fn test_imply_imply_iff_and() {
        let mut solver = Solver::varisat();
        let a = solver.new_var();
        let b = solver.new_var();
        let x = solver.new_var();
        let ys = solver.new_vars(2);
        solver.imply_imply_iff_and(a, b, x, &ys);
        assert!(solver.solve(&[a, b, x, -ys[0]]).unwrap().is_none());
        assert!(solver.solve(&[a, -b, x, -ys[0]]).unwrap().is_some());
        assert!(solver.solve(&[a, b, -x, ys[0], ys[1]]).unwrap().is_none());
    }

    #[test]
    fn test_exactly_one() {
        let mut solver = Solver::varisat();
        let xs = solver.new_vars(4);
        solver.exactly_one(&xs);
        let model = solver.solve(&[]).unwrap().unwrap();
        let count = xs.iter().filter(|&&x| model.value(x)).count();
        assert_eq!(count, 1);
        assert!(solver.solve(&[xs[0], xs[3]]).unwrap().is_none());
        assert!(solver.solve(&[-xs[0], -xs[1], -xs[2], -xs[3]]).unwrap().is_none());
    }
}
