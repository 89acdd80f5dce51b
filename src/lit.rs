use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A SAT literal: a non-zero signed variable index, DIMACS-style.
///
/// Variables are 1-indexed, so `Lit(5)` is the positive literal of variable 5
/// and `Lit(-5)` is its negation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Lit(i32);

impl Lit {
    pub const fn new(value: i32) -> Self {
        assert!(value != 0, "Literal should not be zero");
        Self(value)
    }

    pub const fn positive(var: u32) -> Self {
        Self::new(var as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the internal (DIMACS) representation of the literal.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the variable of the literal.
    pub const fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", if self.is_negated() { "~" } else { "" }, self.var())
    }
}
