//! Automata and scenario trees to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! - **States** are rendered as boxes labeled with the state id, the output
//!   event and the algorithm (`bot/top`).
//! - **Initial state** is drawn with a double outline.
//! - **Transitions** are labeled `k: EVENT/guard`, where `k` is the priority
//!   among the transitions of the source state.
//! - **Loop-backs** of negative trees are dashed edges.
//!
//! # Examples
//!
//! ```
//! use fbsat::automaton::{Algorithm, Automaton};
//! use fbsat::guard::{Guard, GuardNode, ParseTreeGuard};
//! use fbsat::scenario::{Alphabet, InputEvent, OutputEvent, OutputValues};
//!
//! let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x"], ["z"]);
//! let mut automaton = Automaton::new(alphabet, OutputValues::zeros(1));
//! let s1 = automaton.add_state(None, Algorithm::zero(1));
//! let s2 = automaton.add_state(Some(OutputEvent::new(1)), Algorithm::new(vec![true], vec![true]));
//! let guard = Guard::ParseTree(ParseTreeGuard::new(vec![GuardNode::Terminal(1)]));
//! automaton.add_transition(s1, s2, InputEvent::new(1), guard);
//!
//! let dot = automaton.to_dot().unwrap();
//! assert!(dot.contains("1 -> 2"));
//! // Render with: dot -Tpdf automaton.dot -o automaton.pdf
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::automaton::Automaton;
use crate::tree::{NegativeScenarioTree, Tree};

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for states (default: "box")
    pub state_shape: &'static str,
    /// Number of outlines of the initial state (default: 2)
    pub initial_peripheries: usize,
    /// Style for transitions (default: "solid")
    pub edge_style: &'static str,
    /// Style for loop-backs of negative trees (default: "dashed")
    pub loop_style: &'static str,
    /// Whether to use HTML labels with subscripted priorities (default: false)
    pub use_html_labels: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            state_shape: "box",
            initial_peripheries: 2,
            edge_style: "solid",
            loop_style: "dashed",
            use_html_labels: false,
        }
    }
}

impl Automaton {
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let alphabet = self.alphabet();
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape={}];", config.state_shape)?;

        for state in self.states() {
            let event = match state.output_event {
                Some(o) => alphabet.output_event_name(o),
                None => "ε",
            };
            let peripheries = if state.id == 1 { config.initial_peripheries } else { 1 };
            writeln!(
                dot,
                "{} [label=\"{} / {}\\n{}\", peripheries={}];",
                state.id, state.id, event, state.algorithm, peripheries
            )?;
        }

        for state in self.states() {
            for (k, t) in state.transitions.iter().enumerate() {
                let event = alphabet.input_event_name(t.input_event);
                let guard = t.guard.to_string_with(&alphabet.input_names);
                let label = if config.use_html_labels {
                    format!("<{}<SUB>{}</SUB>: {}>", event, k + 1, escape_html(&guard))
                } else {
                    format!("\"{}: {}/{}\"", k + 1, event, guard)
                };
                writeln!(
                    dot,
                    "{} -> {} [label={}, style={}];",
                    state.id, t.destination, label, config.edge_style
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render a negative scenario tree.
///
/// Each node is labeled with its element and, if present in `heat`, with the
/// automaton states it was mapped to. The node `highlight` (e.g. the null
/// vertex) is filled. Rejecting vertices get a double outline.
pub fn negative_tree_to_dot(
    tree: &NegativeScenarioTree,
    heat: &BTreeMap<usize, BTreeSet<usize>>,
    highlight: Option<usize>,
    config: &DotConfig,
) -> Result<String, std::fmt::Error> {
    let alphabet = tree.alphabet();
    let mut dot = String::new();
    writeln!(dot, "digraph {{")?;
    writeln!(dot, "node [shape={}];", config.state_shape)?;

    let rejecting: BTreeSet<usize> = tree.rejecting_vertices().collect();
    for v in tree.nodes() {
        let element = tree.element(v);
        let input = match element.input.event {
            Some(e) => format!("{}[{}]", alphabet.input_event_name(e), element.input.values),
            None => "ε".to_string(),
        };
        let output = match element.output.event {
            Some(o) => format!("{}[{}]", alphabet.output_event_name(o), element.output.values),
            None => format!("ε[{}]", element.output.values),
        };
        let states = heat
            .get(&v)
            .map(|states| states.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        let fill = if highlight == Some(v) {
            ", style=filled, fillcolor=lightgray"
        } else {
            ""
        };
        let peripheries = if rejecting.contains(&v) { 2 } else { 1 };
        writeln!(
            dot,
            "{} [label=\"{}: {} / {}\\n{{{}}}\", peripheries={}{}];",
            v, v, input, output, states, peripheries, fill
        )?;
    }

    for v in 2..=tree.size() {
        writeln!(dot, "{} -> {} [style={}];", tree.parent(v), v, config.edge_style)?;
    }
    for v in tree.vertices_with_loops() {
        for l in tree.loop_backs(v) {
            writeln!(dot, "{} -> {} [style={}, constraint=false];", v, l, config.loop_style)?;
        }
    }

    writeln!(dot, "}}")?;
    Ok(dot)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::automaton::Algorithm;
    use crate::guard::{Guard, GuardNode, ParseTreeGuard};
    use crate::scenario::{
        Alphabet, InputAction, InputEvent, InputValues, NegativeScenario, OutputAction, OutputEvent, OutputValues,
        ScenarioElement,
    };
    use crate::tree::ScenarioTree;

    fn automaton() -> Automaton {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x1", "x2"], ["z"]);
        let mut automaton = Automaton::new(alphabet, OutputValues::zeros(1));
        let s1 = automaton.add_state(None, Algorithm::zero(1));
        let s2 = automaton.add_state(Some(OutputEvent::new(1)), Algorithm::new(vec![true], vec![true]));
        let guard = ParseTreeGuard::new(vec![GuardNode::And(2, 3), GuardNode::Terminal(1), GuardNode::Terminal(2)]);
        automaton.add_transition(s1, s2, InputEvent::new(1), Guard::ParseTree(guard));
        automaton
    }

    #[test]
    fn test_automaton_to_dot() {
        let dot = automaton().to_dot().unwrap();
        println!("{}", dot);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("peripheries=2"));
        assert!(dot.contains("1 -> 2 [label=\"1: REQ/(x1 & x2)\", style=solid];"));
    }

    #[test]
    fn test_html_labels() {
        let config = DotConfig {
            use_html_labels: true,
            ..DotConfig::default()
        };
        let dot = automaton().to_dot_with_config(&config).unwrap();
        println!("{}", dot);
        assert!(dot.contains("<REQ<SUB>1</SUB>: (x1 &amp; x2)>"));
    }

    #[test]
    fn test_negative_tree_to_dot() {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x1", "x2"], ["z"]);
        let tree = ScenarioTree::new(alphabet, None).unwrap();
        let negative = NegativeScenarioTree::from_positive(&tree);
        let heat = BTreeMap::from([(1, BTreeSet::from([1]))]);
        let dot = negative_tree_to_dot(&negative, &heat, Some(1), &DotConfig::default()).unwrap();
        println!("{}", dot);
        assert!(dot.contains("fillcolor=lightgray"));
        assert!(dot.contains("{1}"));
    }

    #[test]
    fn test_rejecting_vertex_has_double_outline() {
        let alphabet = Alphabet::new(["REQ"], ["CNF"], ["x1", "x2"], ["z"]);
        let tree = ScenarioTree::new(alphabet, None).unwrap();
        let mut negative = NegativeScenarioTree::from_positive(&tree);
        let element = ScenarioElement::new(
            InputAction {
                event: Some(InputEvent::new(1)),
                values: InputValues::new(vec![true, false]),
            },
            OutputAction {
                event: Some(OutputEvent::new(1)),
                values: OutputValues::new(vec![true]),
            },
        );
        negative
            .add_negative_scenario(NegativeScenario::new(vec![element], None).unwrap())
            .unwrap();
        let dot = negative_tree_to_dot(&negative, &BTreeMap::new(), None, &DotConfig::default()).unwrap();
        println!("{}", dot);
        assert!(dot.contains("2 [label=\"2: REQ[10] / CNF[1]\\n{}\", peripheries=2];"));
        assert!(dot.contains("1 -> 2 [style=solid];"));
    }
}
