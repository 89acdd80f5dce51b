//! Transition guards.
//!
//! A [`ParseTreeGuard`] is a topologically sorted arena of nodes: node 1 is
//! the root and every child has a larger index than its parent. Evaluation
//! collapses the arena from the leaves up.

use std::collections::BTreeMap;
use std::fmt;

use crate::scenario::InputValues;
use crate::utils::format_bits;

/// Type of a guard parse-tree node, as chosen by the solver.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum NodeType {
    Terminal,
    And,
    Or,
    Not,
    None,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Terminal,
        NodeType::And,
        NodeType::Or,
        NodeType::Not,
        NodeType::None,
    ];

    pub fn is_binary(self) -> bool {
        matches!(self, NodeType::And | NodeType::Or)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum GuardBoxed {
    Term(usize),
    Not(Box<GuardBoxed>),
    And(Box<GuardBoxed>, Box<GuardBoxed>),
    Or(Box<GuardBoxed>, Box<GuardBoxed>),
}

impl GuardBoxed {
    pub fn term(x: usize) -> Self {
        GuardBoxed::Term(x)
    }

    pub fn not(value: Self) -> Self {
        GuardBoxed::Not(Box::new(value))
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        GuardBoxed::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        GuardBoxed::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn eval(&self, values: &InputValues) -> bool {
        match self {
            GuardBoxed::Term(x) => values.get(*x),
            GuardBoxed::Not(a) => !a.eval(values),
            GuardBoxed::And(a, b) => a.eval(values) && b.eval(values),
            GuardBoxed::Or(a, b) => a.eval(values) || b.eval(values),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            GuardBoxed::Term(_) => 1,
            GuardBoxed::Not(a) => 1 + a.size(),
            GuardBoxed::And(a, b) | GuardBoxed::Or(a, b) => 1 + a.size() + b.size(),
        }
    }

    /// Render with the given names for input variables, using `not`, `and`,
    /// `or` as the three operator symbols.
    fn render(&self, names: &[String], ops: [&str; 3]) -> String {
        let [not, and, or] = ops;
        match self {
            GuardBoxed::Term(x) => names.get(*x - 1).cloned().unwrap_or_else(|| format!("x{}", x)),
            GuardBoxed::Not(a) => format!("{}{}", not, a.render(names, ops)),
            GuardBoxed::And(a, b) => format!("({} {} {})", a.render(names, ops), and, b.render(names, ops)),
            GuardBoxed::Or(a, b) => format!("({} {} {})", a.render(names, ops), or, b.render(names, ops)),
        }
    }

    pub fn to_string_with(&self, names: &[String]) -> String {
        self.render(names, ["~", "&", "|"])
    }

    pub fn to_smv(&self, names: &[String]) -> String {
        self.render(names, ["!", "&", "|"])
    }
}

impl fmt::Display for GuardBoxed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with(&[]))
    }
}

/// Node of a parse-tree guard. Children are 1-based node indices.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GuardNode<I = usize> {
    Terminal(usize),
    Not(I),
    And(I, I),
    Or(I, I),
}

impl<A> GuardNode<A> {
    fn fmap_ref<B, F>(&self, mut f: F) -> GuardNode<B>
    where
        F: FnMut(&A) -> B,
    {
        match self {
            GuardNode::Terminal(x) => GuardNode::Terminal(*x),
            GuardNode::Not(a) => GuardNode::Not(f(a)),
            GuardNode::And(a, b) => GuardNode::And(f(a), f(b)),
            GuardNode::Or(a, b) => GuardNode::Or(f(a), f(b)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseTreeGuard {
    /// Topologically sorted nodes; the root is at index 0.
    nodes: Vec<GuardNode>,
}

impl ParseTreeGuard {
    /// # Panics
    ///
    /// Panics if `nodes` is empty or some child index does not exceed its
    /// parent's index.
    pub fn new(nodes: Vec<GuardNode>) -> Self {
        assert!(!nodes.is_empty(), "Parse tree must have a root");
        for (i, node) in nodes.iter().enumerate() {
            let p = i + 1;
            node.fmap_ref(|&child| {
                assert!(child > p && child <= nodes.len(), "Bad child {} of node {}", child, p);
            });
        }
        Self { nodes }
    }

    pub fn nodes(&self) -> &[GuardNode] {
        &self.nodes
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    fn collapse<R, F>(&self, mut collapse: F) -> R
    where
        F: FnMut(GuardNode<R>) -> R,
    {
        let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(self.nodes.len()).collect();

        for (i, node) in self.nodes.iter().enumerate().rev() {
            let node = node.fmap_ref(|&child| results[child - 1].take().unwrap());
            results[i] = Some(collapse(node));
        }

        results.into_iter().next().unwrap().unwrap()
    }

    pub fn eval(&self, values: &InputValues) -> bool {
        self.collapse(|node: GuardNode<bool>| match node {
            GuardNode::Terminal(x) => values.get(x),
            GuardNode::Not(a) => !a,
            GuardNode::And(a, b) => a && b,
            GuardNode::Or(a, b) => a || b,
        })
    }

    pub fn to_boxed(&self) -> GuardBoxed {
        self.collapse(|node: GuardNode<GuardBoxed>| match node {
            GuardNode::Terminal(x) => GuardBoxed::term(x),
            GuardNode::Not(a) => GuardBoxed::not(a),
            GuardNode::And(a, b) => GuardBoxed::and(a, b),
            GuardNode::Or(a, b) => GuardBoxed::or(a, b),
        })
    }
}

/// Guard given by its values on the known input vectors.
/// Unknown input vectors evaluate to `false`.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct TruthTableGuard {
    table: BTreeMap<InputValues, bool>,
}

impl TruthTableGuard {
    pub fn new(table: BTreeMap<InputValues, bool>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &BTreeMap<InputValues, bool> {
        &self.table
    }

    pub fn eval(&self, values: &InputValues) -> bool {
        self.table.get(values).copied().unwrap_or(false)
    }

    /// Disjunction of minterms of the input vectors mapped to `true`.
    pub fn to_smv(&self, names: &[String]) -> String {
        let minterms: Vec<String> = self
            .table
            .iter()
            .filter(|&(_, &value)| value)
            .map(|(input, _)| {
                let literals: Vec<String> = input
                    .values()
                    .iter()
                    .zip(names)
                    .map(|(&bit, name)| if bit { name.clone() } else { format!("!{}", name) })
                    .collect();
                if literals.is_empty() {
                    "TRUE".to_string()
                } else {
                    format!("({})", literals.join(" & "))
                }
            })
            .collect();
        if minterms.is_empty() {
            "FALSE".to_string()
        } else {
            minterms.join(" | ")
        }
    }
}

impl fmt::Display for TruthTableGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ones: Vec<String> = self
            .table
            .iter()
            .filter(|&(_, &value)| value)
            .map(|(input, _)| format_bits(input.values()))
            .collect();
        write!(f, "[{}]", ones.join(", "))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Guard {
    TruthTable(TruthTableGuard),
    ParseTree(ParseTreeGuard),
}

impl Guard {
    pub fn eval(&self, values: &InputValues) -> bool {
        match self {
            Guard::TruthTable(guard) => guard.eval(values),
            Guard::ParseTree(guard) => guard.eval(values),
        }
    }

    /// Number of parse-tree nodes; truth tables have none.
    pub fn size(&self) -> usize {
        match self {
            Guard::TruthTable(_) => 0,
            Guard::ParseTree(guard) => guard.size(),
        }
    }

    pub fn to_string_with(&self, names: &[String]) -> String {
        match self {
            Guard::TruthTable(guard) => guard.to_string(),
            Guard::ParseTree(guard) => guard.to_boxed().to_string_with(names),
        }
    }

    pub fn to_smv(&self, names: &[String]) -> String {
        match self {
            Guard::TruthTable(guard) => guard.to_smv(names),
            Guard::ParseTree(guard) => guard.to_boxed().to_smv(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn input(s: &str) -> InputValues {
        InputValues::parse(s).unwrap()
    }

    /// `(x1 & ~x2) | (~x1 & x2)`
    fn xor_guard() -> ParseTreeGuard {
        ParseTreeGuard::new(vec![
            GuardNode::Or(2, 3),
            GuardNode::And(4, 5),
            GuardNode::And(6, 7),
            GuardNode::Terminal(1),
            GuardNode::Not(8),
            GuardNode::Not(9),
            GuardNode::Terminal(2),
            GuardNode::Terminal(2),
            GuardNode::Terminal(1),
        ])
    }

    #[test]
    fn test_eval() {
        let guard = xor_guard();
        println!("guard = {}", guard.to_boxed());
        assert_eq!(guard.size(), 9);
        assert!(!guard.eval(&input("00")));
        assert!(guard.eval(&input("01")));
        assert!(guard.eval(&input("10")));
        assert!(!guard.eval(&input("11")));
    }

    #[test]
    fn test_to_boxed() {
        let guard = ParseTreeGuard::new(vec![GuardNode::And(2, 3), GuardNode::Terminal(1), GuardNode::Not(4), GuardNode::Terminal(2)]);
        let boxed = guard.to_boxed();
        assert_eq!(boxed, GuardBoxed::and(GuardBoxed::term(1), GuardBoxed::not(GuardBoxed::term(2))));
        assert_eq!(boxed.size(), guard.size());
        assert_eq!(boxed.to_string(), "(x1 & ~x2)");
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(boxed.to_smv(&names), "(a & !b)");
        for s in ["00", "01", "10", "11"] {
            assert_eq!(boxed.eval(&input(s)), guard.eval(&input(s)));
        }
    }

    #[test]
    #[should_panic(expected = "Bad child")]
    fn test_child_must_follow_parent() {
        ParseTreeGuard::new(vec![GuardNode::Terminal(1), GuardNode::Not(1)]);
    }

    #[test]
    fn test_truth_table() {
        let guard = TruthTableGuard::new(BTreeMap::from([(input("01"), true), (input("11"), false)]));
        assert!(guard.eval(&input("01")));
        assert!(!guard.eval(&input("11")));
        assert!(!guard.eval(&input("00")));
        assert_eq!(guard.to_string(), "[01]");
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(guard.to_smv(&names), "(!a & b)");
        assert_eq!(Guard::TruthTable(guard).size(), 0);
    }
}
