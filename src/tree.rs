//! Scenario trees: prefix tries over scenario elements.
//!
//! Nodes are 1-indexed; node 1 is the root, which carries no input event, no
//! output event and the initial output values. Each node records the number
//! `u` of its input vector in the tree's table of unique input vectors.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::scenario::{
    Alphabet, InputAction, InputEvent, InputValues, NegativeScenario, OutputAction, OutputEvent, OutputValues,
    PositiveScenario, ScenarioElement,
};

#[derive(Debug, Clone)]
struct Node {
    parent: usize,
    element: ScenarioElement,
    input_number: usize,
    children: Vec<usize>,
}

/// Storage shared by positive and negative trees.
#[derive(Debug, Clone)]
pub struct Trie {
    alphabet: Alphabet,
    nodes: Vec<Node>,
    unique_inputs: Vec<InputValues>,
    input_numbers: HashMap<InputValues, usize>,
}

impl Trie {
    fn new(alphabet: Alphabet, initial_output_values: OutputValues) -> Self {
        let root = Node {
            parent: 0,
            element: ScenarioElement {
                input: InputAction {
                    event: None,
                    values: InputValues::zeros(alphabet.num_input_variables()),
                },
                output: OutputAction {
                    event: None,
                    values: initial_output_values,
                },
            },
            input_number: 0,
            children: Vec::new(),
        };
        Self {
            alphabet,
            nodes: vec![root],
            unique_inputs: Vec::new(),
            input_numbers: HashMap::new(),
        }
    }

    fn node(&self, v: usize) -> &Node {
        assert_ne!(v, 0, "Node ids must be >= 1");
        &self.nodes[v - 1]
    }

    fn check_widths(&self, element: &ScenarioElement) -> Result<()> {
        let x = self.alphabet.num_input_variables();
        let z = self.alphabet.num_output_variables();
        if element.input.values.len() != x {
            return Err(Error::MalformedScenario(format!(
                "input values '{}' have width {}, expected {}",
                element.input.values,
                element.input.values.len(),
                x
            )));
        }
        if element.output.values.len() != z {
            return Err(Error::MalformedScenario(format!(
                "output values '{}' have width {}, expected {}",
                element.output.values,
                element.output.values.len(),
                z
            )));
        }
        Ok(())
    }

    fn input_number_or_insert(&mut self, values: &InputValues) -> usize {
        if let Some(&u) = self.input_numbers.get(values) {
            return u;
        }
        self.unique_inputs.push(values.clone());
        let u = self.unique_inputs.len();
        self.input_numbers.insert(values.clone(), u);
        u
    }

    fn add_child(&mut self, parent: usize, element: ScenarioElement, input_number: usize) -> usize {
        self.nodes.push(Node {
            parent,
            element,
            input_number,
            children: Vec::new(),
        });
        let v = self.nodes.len();
        self.nodes[parent - 1].children.push(v);
        v
    }
}

/// Read access to a scenario tree.
pub trait Tree {
    fn trie(&self) -> &Trie;

    fn alphabet(&self) -> &Alphabet {
        &self.trie().alphabet
    }

    /// Number of nodes, including the root.
    fn size(&self) -> usize {
        self.trie().nodes.len()
    }

    fn nodes(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.size()
    }

    /// Parent of a non-root node; `0` for the root.
    fn parent(&self, v: usize) -> usize {
        self.trie().node(v).parent
    }

    fn children(&self, v: usize) -> &[usize] {
        &self.trie().node(v).children
    }

    fn element(&self, v: usize) -> &ScenarioElement {
        &self.trie().node(v).element
    }

    fn input_event(&self, v: usize) -> Option<InputEvent> {
        self.element(v).input.event
    }

    /// Number of the node's input vector; `0` for the root.
    fn input_number(&self, v: usize) -> usize {
        self.trie().node(v).input_number
    }

    fn input_values(&self, v: usize) -> &InputValues {
        &self.element(v).input.values
    }

    fn output_event(&self, v: usize) -> Option<OutputEvent> {
        self.element(v).output.event
    }

    fn output_values(&self, v: usize) -> &OutputValues {
        &self.element(v).output.values
    }

    fn output_value(&self, v: usize, z: usize) -> bool {
        self.output_values(v).get(z)
    }

    /// Unique input vectors; input number `u` is at index `u - 1`.
    fn unique_inputs(&self) -> &[InputValues] {
        &self.trie().unique_inputs
    }

    fn input_values_by_number(&self, u: usize) -> &InputValues {
        &self.trie().unique_inputs[u - 1]
    }

    fn initial_output_values(&self) -> &OutputValues {
        self.output_values(1)
    }

    /// Non-root nodes that emit an output event.
    fn active_vertices(&self) -> Vec<usize> {
        (2..=self.size()).filter(|&v| self.output_event(v).is_some()).collect()
    }

    /// Non-root nodes that emit no output event.
    fn passive_vertices(&self) -> Vec<usize> {
        (2..=self.size()).filter(|&v| self.output_event(v).is_none()).collect()
    }
}

/// Positive scenario tree.
#[derive(Debug, Clone)]
pub struct ScenarioTree {
    trie: Trie,
    scenarios: Vec<PositiveScenario>,
}

impl Tree for ScenarioTree {
    fn trie(&self) -> &Trie {
        &self.trie
    }
}

impl ScenarioTree {
    /// Create an empty tree. Output values start at `initial_output_values`,
    /// or all zeros when `None`.
    pub fn new(alphabet: Alphabet, initial_output_values: Option<OutputValues>) -> Result<Self> {
        let z = alphabet.num_output_variables();
        let initial = initial_output_values.unwrap_or_else(|| OutputValues::zeros(z));
        if initial.len() != z {
            return Err(Error::Config(format!(
                "initial output values '{}' have width {}, expected {}",
                initial,
                initial.len(),
                z
            )));
        }
        Ok(Self {
            trie: Trie::new(alphabet, initial),
            scenarios: Vec::new(),
        })
    }

    pub fn from_scenarios(
        alphabet: Alphabet,
        initial_output_values: Option<OutputValues>,
        scenarios: impl IntoIterator<Item = PositiveScenario>,
    ) -> Result<Self> {
        let mut tree = Self::new(alphabet, initial_output_values)?;
        for scenario in scenarios {
            tree.add_scenario(scenario)?;
        }
        Ok(tree)
    }

    pub fn scenarios(&self) -> &[PositiveScenario] {
        &self.scenarios
    }

    /// Merge the scenario into the tree.
    ///
    /// Elements are merged into an existing child iff the input event and the
    /// input vector match. A merged element must agree on the output action.
    pub fn add_scenario(&mut self, scenario: PositiveScenario) -> Result<()> {
        let mut current = 1;
        for element in scenario.elements() {
            self.trie.check_widths(element)?;
            if element.input.event.is_none() && element.output.event.is_some() {
                return Err(Error::MalformedScenario(
                    "element without an input event emits an output event".to_string(),
                ));
            }
            if element.output.event.is_none() && &element.output.values != self.output_values(current) {
                return Err(Error::MalformedScenario(format!(
                    "passive element changes output values from '{}' to '{}'",
                    self.output_values(current),
                    element.output.values
                )));
            }
            let u = self.trie.input_number_or_insert(&element.input.values);
            let existing = self
                .children(current)
                .iter()
                .copied()
                .find(|&child| self.input_event(child) == element.input.event && self.input_number(child) == u);
            current = match existing {
                Some(child) => {
                    if self.element(child).output != element.output {
                        return Err(Error::ScenarioInconsistency {
                            node: child,
                            reason: format!(
                                "output {:?} conflicts with {:?}",
                                element.output,
                                self.element(child).output
                            ),
                        });
                    }
                    child
                }
                None => self.trie.add_child(current, element.clone(), u),
            };
        }
        debug!("Added scenario of length {}, tree size is {}", scenario.len(), self.size());
        self.scenarios.push(scenario);
        Ok(())
    }
}

/// Negative scenario tree: counterexample traces with loop-backs.
///
/// A negative tree shares the input numbering of the positive tree it was
/// created from, so input numbers `u <= U` denote the same vectors in both.
#[derive(Debug, Clone)]
pub struct NegativeScenarioTree {
    trie: Trie,
    scenarios: Vec<NegativeScenario>,
    loop_backs: BTreeMap<usize, BTreeSet<usize>>,
    rejecting: BTreeSet<usize>,
}

impl Tree for NegativeScenarioTree {
    fn trie(&self) -> &Trie {
        &self.trie
    }
}

impl NegativeScenarioTree {
    pub fn from_positive(tree: &ScenarioTree) -> Self {
        let mut trie = Trie::new(tree.alphabet().clone(), tree.initial_output_values().clone());
        for values in tree.unique_inputs() {
            trie.input_number_or_insert(values);
        }
        Self {
            trie,
            scenarios: Vec::new(),
            loop_backs: BTreeMap::new(),
            rejecting: BTreeSet::new(),
        }
    }

    pub fn negative_scenarios(&self) -> &[NegativeScenario] {
        &self.scenarios
    }

    /// Loop-back targets of node `v`.
    pub fn loop_backs(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.loop_backs.get(&v).into_iter().flatten().copied()
    }

    pub fn vertices_with_loops(&self) -> impl Iterator<Item = usize> + '_ {
        self.loop_backs.keys().copied()
    }

    pub fn num_loop_backs(&self) -> usize {
        self.loop_backs.values().map(BTreeSet::len).sum()
    }

    /// Last nodes of finite negative scenarios: reaching them at all is a
    /// violation.
    pub fn rejecting_vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.rejecting.iter().copied()
    }

    /// Summary of the tree shape, used to detect growth.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size(), self.num_loop_backs(), self.rejecting.len())
    }

    /// Ancestors of `v` from `v` itself up to and including the root.
    pub fn path_to_root(&self, v: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = v;
        while current != 0 {
            path.push(current);
            current = self.parent(current);
        }
        path
    }

    /// Merge the scenario into the tree.
    ///
    /// Elements are merged into an existing child iff the whole element
    /// (input and output actions) is equal. A lasso scenario adds a loop-back
    /// from its last node to the node at its loop position; a finite one
    /// marks its last node as rejecting.
    pub fn add_negative_scenario(&mut self, scenario: NegativeScenario) -> Result<()> {
        for element in scenario.elements() {
            self.trie.check_widths(element)?;
        }

        let mut path = vec![1];
        let mut current = 1;
        for element in scenario.elements() {
            let u = self.trie.input_number_or_insert(&element.input.values);
            let existing = self
                .children(current)
                .iter()
                .copied()
                .find(|&child| self.input_number(child) == u && self.element(child) == element);
            current = match existing {
                Some(child) => child,
                None => self.trie.add_child(current, element.clone(), u),
            };
            path.push(current);
        }

        let last = current;
        match scenario.loop_position() {
            Some(l) if path[l - 1] != last => {
                self.loop_backs.entry(last).or_default().insert(path[l - 1]);
            }
            Some(_) => {
                warn!("Empty loop at node {}, treating the scenario as finite", last);
                self.rejecting.insert(last);
            }
            None => {
                self.rejecting.insert(last);
            }
        }
        debug!(
            "Added negative scenario of length {}, tree size is {}, {} loop-backs",
            scenario.len(),
            self.size(),
            self.num_loop_backs()
        );
        self.scenarios.push(scenario);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn alphabet() -> Alphabet {
        Alphabet::new(["REQ"], ["CNF"], ["x1", "x2"], ["z"])
    }

    fn scenario(line: &str) -> PositiveScenario {
        PositiveScenario::parse(line, &alphabet(), &OutputValues::zeros(1)).unwrap()
    }

    #[test]
    fn test_root() {
        let tree = ScenarioTree::new(alphabet(), None).unwrap();
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.parent(1), 0);
        assert_eq!(tree.input_event(1), None);
        assert_eq!(tree.output_event(1), None);
        assert_eq!(tree.input_number(1), 0);
        assert_eq!(tree.initial_output_values(), &OutputValues::zeros(1));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]; in=REQ[11]")).unwrap();
        let size = tree.size();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]; in=REQ[11]")).unwrap();
        assert_eq!(tree.size(), size);
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]")).unwrap();
        assert_eq!(tree.size(), size);
        assert_eq!(tree.scenarios().len(), 3);
    }

    #[test]
    fn test_shared_prefix() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]; in=REQ[11]")).unwrap();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]; in=REQ[01]; out=CNF[0]")).unwrap();
        println!("size = {}, unique inputs = {:?}", tree.size(), tree.unique_inputs());
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children(2), &[3, 4]);
        assert_eq!(tree.unique_inputs().len(), 3);
        assert_eq!(tree.input_number(2), 1);
        assert_eq!(tree.input_number(4), 3);
        assert_eq!(tree.active_vertices(), vec![2, 4]);
        assert_eq!(tree.passive_vertices(), vec![3]);
        assert!(tree.output_value(2, 1));
        assert!(!tree.output_value(4, 1));
    }

    #[test]
    fn test_inconsistent_scenario() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]")).unwrap();
        let result = tree.add_scenario(scenario("in=REQ[00]"));
        assert!(matches!(result, Err(Error::ScenarioInconsistency { node: 2, .. })));
    }

    #[test]
    fn test_wrong_width() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        let wide = Alphabet::new(["REQ"], ["CNF"], ["a", "b", "c"], ["z"]);
        let s = PositiveScenario::parse("in=REQ[000]", &wide, &OutputValues::zeros(1)).unwrap();
        assert!(matches!(tree.add_scenario(s), Err(Error::MalformedScenario(_))));
    }

    fn epsilon(values: &str, output: Option<OutputEvent>, z: &str) -> ScenarioElement {
        ScenarioElement::new(
            InputAction {
                event: None,
                values: InputValues::parse(values).unwrap(),
            },
            OutputAction {
                event: output,
                values: OutputValues::parse(z).unwrap(),
            },
        )
    }

    #[test]
    fn test_epsilon_elements() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        let mut elements = vec![epsilon("10", None, "0")];
        elements.extend(scenario("in=REQ[10]; out=CNF[1]").elements().iter().cloned());
        tree.add_scenario(PositiveScenario::new(elements)).unwrap();
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.input_event(2), None);
        assert_eq!(tree.passive_vertices(), vec![2]);

        let active = PositiveScenario::new(vec![epsilon("10", Some(OutputEvent::new(1)), "1")]);
        assert!(matches!(tree.add_scenario(active), Err(Error::MalformedScenario(_))));

        // Negative trees take any element, including one that emits.
        let mut negative = NegativeScenarioTree::from_positive(&tree);
        let elements = vec![epsilon("10", None, "0"), epsilon("01", Some(OutputEvent::new(1)), "1")];
        negative.add_negative_scenario(NegativeScenario::new(elements, None).unwrap()).unwrap();
        assert_eq!(negative.size(), 3);
        assert_eq!(negative.input_event(3), None);
        assert_eq!(negative.rejecting_vertices().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_bad_initial_values() {
        let result = ScenarioTree::new(alphabet(), Some(OutputValues::zeros(3)));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_negative_tree_shares_inputs() {
        let mut tree = ScenarioTree::new(alphabet(), None).unwrap();
        tree.add_scenario(scenario("in=REQ[00]; out=CNF[1]; in=REQ[11]")).unwrap();
        let mut negative = NegativeScenarioTree::from_positive(&tree);
        assert_eq!(negative.size(), 1);
        assert_eq!(negative.unique_inputs(), tree.unique_inputs());

        let elements = scenario("in=REQ[11]; out=CNF[1]; in=REQ[10]").elements().to_vec();
        negative
            .add_negative_scenario(NegativeScenario::new(elements.clone(), Some(2)).unwrap())
            .unwrap();
        assert_eq!(negative.size(), 3);
        assert_eq!(negative.input_number(2), 2);
        assert_eq!(negative.input_number(3), 3);
        assert_eq!(negative.loop_backs(3).collect::<Vec<_>>(), vec![2]);
        assert_eq!(negative.vertices_with_loops().collect::<Vec<_>>(), vec![3]);
        assert_eq!(negative.path_to_root(3), vec![3, 2, 1]);

        // Same trace again: no growth, same loop-back.
        negative
            .add_negative_scenario(NegativeScenario::new(elements, Some(2)).unwrap())
            .unwrap();
        assert_eq!(negative.size(), 3);
        assert_eq!(negative.num_loop_backs(), 1);
        assert_eq!(negative.negative_scenarios().len(), 2);
    }

    #[test]
    fn test_negative_tree_merges_whole_elements() {
        let tree = ScenarioTree::new(alphabet(), None).unwrap();
        let mut negative = NegativeScenarioTree::from_positive(&tree);
        let a = scenario("in=REQ[01]; out=CNF[1]").elements().to_vec();
        let b = scenario("in=REQ[01]").elements().to_vec();
        negative.add_negative_scenario(NegativeScenario::new(a, None).unwrap()).unwrap();
        negative.add_negative_scenario(NegativeScenario::new(b, None).unwrap()).unwrap();
        assert_eq!(negative.size(), 3);
        assert_eq!(negative.children(1), &[2, 3]);
        assert_eq!(negative.input_number(2), negative.input_number(3));
        assert_eq!(negative.rejecting_vertices().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(negative.shape(), (3, 0, 2));
    }
}
