//! End-to-end inference tests.
//!
//! Tests cover the encoding invariants observable through decoded models,
//! minimization by bound descent, negative scenarios and the CEGIS loop.

use fbsat::automaton::Automaton;
use fbsat::card::Bound;
use fbsat::cegis::{CegisStrategy, ModelChecker};
use fbsat::config::Config;
use fbsat::counterexample::{Counterexample, TraceState};
use fbsat::inferrer::Inferrer;
use fbsat::scenario::{
    read_scenarios, InputAction, InputEvent, InputValues, NegativeScenario, OutputValues, PositiveScenario,
};
use fbsat::task::{BasicTask, CompleteTask, ExtendedTask};
use fbsat::tree::{NegativeScenarioTree, ScenarioTree, Tree};

fn tree(text: &str, input_names: &[&str]) -> ScenarioTree {
    let input_names = input_names.iter().map(|s| s.to_string()).collect();
    let (alphabet, scenarios) = read_scenarios(text, input_names, vec!["z".to_string()], None).unwrap();
    ScenarioTree::from_scenarios(alphabet, None, scenarios).unwrap()
}

const TOGGLE: &str = "1
in=REQ[1]; out=CNF[1]; in=REQ[0]; out=CNF[0]; in=REQ[1]; out=CNF[1]
";

const XOR: &str = "4
in=REQ[00]
in=REQ[01]; out=CNF[1]
in=REQ[10]; out=CNF[1]
in=REQ[11]
";

fn req(bits: &[bool]) -> InputAction {
    InputAction {
        event: Some(InputEvent::new(1)),
        values: InputValues::new(bits.to_vec()),
    }
}

// ─── Encoding Invariants ───────────────────────────────────────────────────────

#[test]
fn domain_variables_are_one_hot() {
    let tree = tree(TOGGLE, &["x"]);
    let mut inferrer = Inferrer::new(Config::default());
    inferrer.declare(BasicTask::new(tree.clone(), 2)).unwrap();
    let model = inferrer.solve().unwrap().unwrap();
    let basic = inferrer.context().basic.as_ref().unwrap();

    for v in 1..=tree.size() {
        assert_eq!(basic.mapping[[v]].count_true(&model), 1, "mapping of node {}", v);
    }
    for td in basic.transition_destination.values() {
        assert_eq!(td.count_true(&model), 1);
    }
    for oe in basic.state_output_event.values() {
        assert_eq!(oe.count_true(&model), 1);
    }
    assert_eq!(basic.mapping[[1]].decode(&model), 1);
}

#[test]
fn guard_root_matches_transition_firing() {
    let tree = tree(XOR, &["x1", "x2"]);
    let mut inferrer = Inferrer::new(Config::default());
    inferrer.declare(BasicTask::new(tree, 2).with_max_outgoing_transitions(2)).unwrap();
    inferrer.declare(ExtendedTask::new(4)).unwrap();
    let model = inferrer.solve().unwrap().unwrap();
    let basic = inferrer.context().basic.as_ref().unwrap();
    let extended = inferrer.context().extended.as_ref().unwrap();

    for c in 1..=basic.num_states {
        for k in 1..=basic.num_slots {
            if basic.transition_destination[[c, k]].decode(&model) == 0 {
                continue;
            }
            let guard = extended.decode_guard(&model, c, k);
            for u in 1..=basic.num_columns() {
                let column = basic.column(u);
                assert_eq!(
                    model.value(basic.transition_firing(c, k, u)),
                    guard.eval(&column.values),
                    "c = {}, k = {}, u = {}",
                    c,
                    k,
                    u
                );
            }
        }
    }
}

// ─── Parse-Tree Guards ─────────────────────────────────────────────────────────

fn assert_xor(automaton: &Automaton) {
    let initial = OutputValues::zeros(1);
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let result = automaton.step(1, &initial, &req(&[a, b]));
        assert_eq!(result.output.event.is_some(), a ^ b, "x1 = {}, x2 = {}", a, b);
    }
}

#[test]
fn xor_with_three_guard_nodes() {
    let tree = tree(XOR, &["x1", "x2"]);
    let mut inferrer = Inferrer::new(Config::default());

    let small = inferrer
        .extended(&tree, 2, Some(2), 2, Bound::Unbounded, Bound::Unbounded)
        .unwrap();
    assert!(small.is_none());

    // Needs a silent self-loop on state 1 for `x1 & x2` ahead of `x1 | x2`.
    let automaton = inferrer
        .extended(&tree, 2, Some(2), 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap()
        .unwrap();
    println!("{}", automaton);
    assert!(automaton.verify(&tree));
    assert!(automaton.max_guard_size() <= 3);
    assert!(automaton.max_outgoing_transitions() <= 2);
    assert_xor(&automaton);
}

#[test]
fn terminals_order_keeps_solutions() {
    let tree = tree(XOR, &["x1", "x2"]);
    // A single transition needs `(x1 | x2) & ~(x1 & x2)`, eight nodes.
    for (p, k, sat) in [(3, 2, true), (5, 1, false), (8, 1, true)] {
        for encode_terminals_order in [false, true] {
            let config = Config {
                encode_terminals_order,
                ..Config::default()
            };
            let mut inferrer = Inferrer::new(config);
            let automaton = inferrer
                .extended(&tree, 2, Some(k), p, Bound::Unbounded, Bound::Unbounded)
                .unwrap();
            assert_eq!(automaton.is_some(), sat, "P = {}, terminals order = {}", p, encode_terminals_order);
            if let Some(automaton) = &automaton {
                println!("P = {}, terminals order = {}:\n{}", p, encode_terminals_order, automaton);
                assert!(automaton.verify(&tree));
                assert_xor(automaton);
            }
        }
    }
}

// ─── Minimization ──────────────────────────────────────────────────────────────

#[test]
fn optimize_n_descends_to_minimum() {
    let tree = tree(TOGGLE, &["x"]);
    let mut inferrer = Inferrer::new(Config::default());
    let first = inferrer
        .extended(&tree, 2, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap()
        .unwrap();
    let n = first.total_guards_size();
    let best = inferrer.optimize_n(0, Bound::AtMost(n)).unwrap().unwrap();
    println!("N: {} -> {}", n, best.total_guards_size());
    assert!(best.total_guards_size() <= n);
    assert!(best.verify(&tree));

    let below = inferrer
        .extended(&tree, 2, None, 3, Bound::Unbounded, Bound::AtMost(best.total_guards_size() - 1))
        .unwrap();
    assert!(below.is_none());
}

#[test]
fn optimize_t_with_permanent_bounds() {
    let tree = tree(TOGGLE, &["x"]);
    let config = Config {
        use_assumptions: false,
        ..Config::default()
    };
    let mut inferrer = Inferrer::new(config);
    let first = inferrer.basic(&tree, 2, None, Bound::Unbounded).unwrap().unwrap();
    let t = first.number_of_transitions();
    let best = inferrer.optimize_t(0, Bound::AtMost(t)).unwrap().unwrap();
    assert!(best.number_of_transitions() <= t);
    assert!(best.verify(&tree));

    let below = inferrer
        .basic(&tree, 2, None, Bound::AtMost(best.number_of_transitions() - 1))
        .unwrap();
    assert!(below.is_none());
}

#[test]
fn minimal_guards_size_stays_assumed() {
    let tree = tree(XOR, &["x1", "x2"]);
    let mut inferrer = Inferrer::new(Config::default());
    let best = inferrer.extended_min(&tree, Some(2), 3).unwrap().unwrap();
    println!("{}", best);

    let again = inferrer.infer_extended().unwrap().unwrap();
    assert_eq!(again.total_guards_size(), best.total_guards_size());
    assert!(again.verify(&tree));
}

// ─── Negative Scenarios ────────────────────────────────────────────────────────

#[test]
fn empty_negative_tree_keeps_solutions() {
    let tree = tree(TOGGLE, &["x"]);
    let negative = NegativeScenarioTree::from_positive(&tree);
    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .complete(&tree, Some(negative), 2, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap()
        .unwrap();
    assert!(automaton.verify(&tree));
}

#[test]
fn empty_negative_tree_adds_only_root_clause() {
    let tree = tree(TOGGLE, &["x"]);
    let mut inferrer = Inferrer::new(Config::default());
    inferrer.declare(BasicTask::new(tree.clone(), 2)).unwrap();
    inferrer.declare(ExtendedTask::new(3)).unwrap();
    let before = inferrer.solver().num_clauses();
    inferrer
        .declare(CompleteTask::new(Some(NegativeScenarioTree::from_positive(&tree))))
        .unwrap();
    assert_eq!(inferrer.solver().num_clauses(), before + 1);
    assert!(inferrer.infer_complete().unwrap().is_some());
}

#[test]
fn negative_copy_of_positive_scenario_is_unsat() {
    let tree = tree(TOGGLE, &["x"]);
    let mut negative = NegativeScenarioTree::from_positive(&tree);
    let elements = tree.scenarios()[0].elements().to_vec();
    negative
        .add_negative_scenario(NegativeScenario::new(elements, None).unwrap())
        .unwrap();
    assert_eq!(negative.rejecting_vertices().count(), 1);

    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .complete(&tree, Some(negative), 2, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap();
    assert!(automaton.is_none());
}

#[test]
fn negative_scenario_is_avoided() {
    let tree = tree(TOGGLE, &["x"]);
    let alphabet = tree.alphabet().clone();
    // After the toggle, a further REQ[1] must not confirm again.
    let forbidden = PositiveScenario::parse(
        "in=REQ[1]; out=CNF[1]; in=REQ[0]; out=CNF[0]; in=REQ[1]; out=CNF[1]; in=REQ[1]; out=CNF[1]",
        &alphabet,
        &OutputValues::zeros(1),
    )
    .unwrap();
    let mut negative = NegativeScenarioTree::from_positive(&tree);
    negative
        .add_negative_scenario(NegativeScenario::new(forbidden.elements().to_vec(), None).unwrap())
        .unwrap();

    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .complete(&tree, Some(negative.clone()), 3, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap()
        .unwrap();
    println!("{}", automaton);
    assert!(automaton.verify(&tree));
    assert!(automaton.verify_negative(&negative));
}

/// Trace with a step where REQ is not raised, then the toggle's first step.
fn epsilon_trace(epsilon_cnf: &str, epsilon_z: &str) -> Counterexample {
    Counterexample::new(
        vec![
            TraceState::from_pairs([("REQ", "FALSE"), ("CNF", "FALSE"), ("x", "FALSE"), ("z", "FALSE")]),
            TraceState::from_pairs([("REQ", "FALSE"), ("CNF", epsilon_cnf), ("x", "TRUE"), ("z", epsilon_z)]),
            TraceState::from_pairs([("REQ", "TRUE"), ("CNF", "TRUE"), ("x", "TRUE"), ("z", "TRUE")]),
        ],
        None,
    )
}

#[test]
fn epsilon_step_keeps_the_state() {
    let tree = tree(TOGGLE, &["x"]);
    let scenario = epsilon_trace("FALSE", "FALSE")
        .to_negative_scenario(tree.alphabet())
        .unwrap();
    assert_eq!(scenario.elements()[0].input.event, None);
    let mut negative = NegativeScenarioTree::from_positive(&tree);
    negative.add_negative_scenario(scenario).unwrap();
    assert_eq!(negative.input_event(2), None);

    // Every automaton for the toggle does nothing on the first step, then
    // confirms: the trace cannot be avoided.
    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .complete(&tree, Some(negative), 2, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap();
    assert!(automaton.is_none());
}

#[test]
fn epsilon_step_with_output_is_never_reproduced() {
    let tree = tree(TOGGLE, &["x"]);
    let scenario = epsilon_trace("TRUE", "TRUE")
        .to_negative_scenario(tree.alphabet())
        .unwrap();
    let mut negative = NegativeScenarioTree::from_positive(&tree);
    negative.add_negative_scenario(scenario).unwrap();

    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .complete(&tree, Some(negative.clone()), 2, None, 3, Bound::Unbounded, Bound::Unbounded)
        .unwrap()
        .unwrap();
    println!("{}", automaton);
    assert!(automaton.verify(&tree));
    assert!(automaton.verify_negative(&negative));
}

#[test]
fn complete_task_is_incremental() {
    let tree = tree(TOGGLE, &["x"]);
    let mut inferrer = Inferrer::new(Config::default());
    inferrer.declare(BasicTask::new(tree.clone(), 2)).unwrap();
    inferrer.declare(ExtendedTask::new(3)).unwrap();
    inferrer.declare(CompleteTask::new(None)).unwrap();
    let declared = inferrer.context().complete.as_ref().unwrap().declared_size();
    assert_eq!(declared, 1);
    assert!(inferrer.infer_complete().unwrap().is_some());
}

// ─── CEGIS ─────────────────────────────────────────────────────────────────────

/// Property: REQ with `x = 0` never produces an output event. Explores all
/// input sequences up to `depth` and reports the shortest violation.
struct Explorer {
    depth: usize,
    checks: usize,
}

impl Explorer {
    fn trace(automaton: &Automaton, inputs: &[bool]) -> Counterexample {
        let initial = automaton.initial_output_values().get(1);
        let mut states = vec![TraceState::from_pairs([
            ("REQ", "FALSE"),
            ("CNF", "FALSE"),
            ("x", "FALSE"),
            ("z", bool_name(initial)),
        ])];
        let actions: Vec<InputAction> = inputs.iter().map(|&x| req(&[x])).collect();
        for (action, result) in actions.iter().zip(automaton.eval(&actions)) {
            states.push(TraceState::from_pairs([
                ("REQ", "TRUE"),
                ("CNF", bool_name(result.output.event.is_some())),
                ("x", bool_name(action.values.get(1))),
                ("z", bool_name(result.output.values.get(1))),
            ]));
        }
        Counterexample::new(states, None)
    }

    fn violation(automaton: &Automaton, inputs: &[bool]) -> bool {
        let actions: Vec<InputAction> = inputs.iter().map(|&x| req(&[x])).collect();
        let results = automaton.eval(&actions);
        match (inputs.last(), results.last()) {
            (Some(false), Some(result)) => result.output.event.is_some(),
            _ => false,
        }
    }
}

fn bool_name(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

impl ModelChecker for Explorer {
    fn check(&mut self, automaton: &Automaton) -> fbsat::Result<Vec<Counterexample>> {
        self.checks += 1;
        for length in 1..=self.depth {
            for mask in 0..(1usize << length) {
                let inputs: Vec<bool> = (0..length).map(|i| mask & (1 << i) != 0).collect();
                if Self::violation(automaton, &inputs) {
                    return Ok(vec![Self::trace(automaton, &inputs)]);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[test]
fn cegis_converges_on_explored_property() {
    let tree = tree("1\nin=REQ[1]; out=CNF[1]\n", &["x"]);
    let mut checker = Explorer { depth: 3, checks: 0 };
    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .cegis(
            &mut checker,
            CegisStrategy::Bounded,
            BasicTask::new(tree.clone(), 2),
            ExtendedTask::new(3),
            None,
        )
        .unwrap()
        .unwrap();
    println!("{} (after {} checks)", automaton, checker.checks);
    assert!(automaton.verify(&tree));
    assert!(checker.check(&automaton).unwrap().is_empty());
}

#[test]
fn cegis_min_with_observer() {
    let tree = tree("1\nin=REQ[1]; out=CNF[1]\n", &["x"]);
    let mut checker = Explorer { depth: 3, checks: 0 };
    let mut inferrer = Inferrer::new(Config::default());
    let automaton = inferrer
        .cegis_min(&mut checker, CegisStrategy::Assumptions, &tree, None, None, 3)
        .unwrap()
        .unwrap();
    println!("{}", automaton);
    assert!(automaton.verify(&tree));
    assert!(checker.check(&automaton).unwrap().is_empty());
}
