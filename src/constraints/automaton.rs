//! Automaton structure constraints.

use itertools::Itertools;
use log::debug;

use crate::config::{Config, EpsilonOutputEvents, StartStateAlgorithms};
use crate::domain::DomainVar;
use crate::lit::Lit;
use crate::multiarray::MultiArray;
use crate::solver::Solver;
use crate::task::{BasicVariables, InputColumn};

/// Constraints that do not depend on input vectors.
pub fn declare_automaton_constraints(solver: &mut Solver, vars: &BasicVariables, config: &Config) {
    debug!("Declaring automaton structure constraints");
    declare_output_event_constraints(solver, vars, config);
    declare_start_state_algorithm_constraints(solver, vars, config);
    declare_null_transition_constraints(solver, vars);
    if config.forbid_transitions_to_first_state {
        declare_forbid_transitions_to_first_state(solver, vars);
    }
    if config.encode_transitions_order {
        declare_transitions_order(solver, vars);
    }
    if config.bfs_automaton {
        declare_bfs_constraints(solver, vars);
    }
}

fn declare_output_event_constraints(solver: &mut Solver, vars: &BasicVariables, config: &Config) {
    let soe = &vars.state_output_event;
    match config.epsilon_output_events {
        EpsilonOutputEvents::Start => {
            solver.add_clause([soe[[1]].eq(0)]);
        }
        EpsilonOutputEvents::OnlyStart => {
            solver.add_clause([soe[[1]].eq(0)]);
            for c in 2..=vars.num_states {
                solver.add_clause([soe[[c]].neq(0)]);
            }
        }
        EpsilonOutputEvents::None => {
            for c in 1..=vars.num_states {
                solver.add_clause([soe[[c]].neq(0)]);
            }
        }
    }
}

fn declare_start_state_algorithm_constraints(solver: &mut Solver, vars: &BasicVariables, config: &Config) {
    for z in 1..=vars.num_outputs {
        let top = vars.state_algorithm_top[[1, z]];
        let bot = vars.state_algorithm_bot[[1, z]];
        match config.start_state_algorithms {
            StartStateAlgorithms::Nothing => {
                solver.add_clause([top]);
                solver.add_clause([-bot]);
            }
            StartStateAlgorithms::Zero => {
                solver.add_clause([-top]);
                solver.add_clause([-bot]);
            }
            StartStateAlgorithms::Any => {}
        }
    }
}

/// Null transitions have no input event and come last.
fn declare_null_transition_constraints(solver: &mut Solver, vars: &BasicVariables) {
    let td = &vars.transition_destination;
    let tie = &vars.transition_input_event;
    for c in 1..=vars.num_states {
        for k in 1..=vars.num_slots {
            solver.iff(td[[c, k]].eq(0), tie[[c, k]].eq(0));
            if k < vars.num_slots {
                solver.imply(td[[c, k]].eq(0), td[[c, k + 1]].eq(0));
            }
        }
    }
}

fn declare_forbid_transitions_to_first_state(solver: &mut Solver, vars: &BasicVariables) {
    for c in 2..=vars.num_states {
        for k in 1..=vars.num_slots {
            solver.add_clause([vars.transition_destination[[c, k]].neq(1)]);
        }
    }
}

/// Transitions of a state are sorted by input event.
fn declare_transitions_order(solver: &mut Solver, vars: &BasicVariables) {
    let tie = &vars.transition_input_event;
    for c in 1..=vars.num_states {
        for k in 1..vars.num_slots {
            for (e, e_prev) in (1..=vars.num_input_events).tuple_combinations() {
                solver.imply(tie[[c, k]].eq(e_prev), tie[[c, k + 1]].neq(e));
            }
        }
    }
}

/// States are numbered in BFS order from the initial state.
fn declare_bfs_constraints(solver: &mut Solver, vars: &BasicVariables) {
    let num_states = vars.num_states;
    if num_states < 2 {
        return;
    }
    let td = &vars.transition_destination;

    // bfs_transition[i, j] for i < j: some transition goes from i to j.
    let bfs_transition = MultiArray::new_with([num_states, num_states], |[i, j]| {
        if i < j {
            let lit = solver.new_var();
            let targets: Vec<Lit> = (1..=vars.num_slots).map(|k| td[[i, k]].eq(j)).collect();
            solver.iff_or(lit, &targets);
            lit
        } else {
            solver.false_lit()
        }
    });

    // bfs_parent[j] is the smallest state with a transition into j.
    let bfs_parent: Vec<DomainVar<usize>> = (2..=num_states)
        .map(|j| {
            let parent = DomainVar::new(solver, 1..j);
            for i in 1..j {
                let mut conjuncts = vec![bfs_transition[[i, j]]];
                conjuncts.extend((1..i).map(|r| -bfs_transition[[r, j]]));
                solver.iff_and(parent.eq(i), &conjuncts);
            }
            parent
        })
        .collect();
    let parent = |j: usize| &bfs_parent[j - 2];

    // Parents are non-decreasing.
    for j in 3..=num_states {
        for i in 1..j {
            for r in (i + 1)..=(j - 2) {
                solver.imply(parent(j).eq(i), parent(j - 1).neq(r));
            }
        }
    }
}

/// Constraints for the variables of one input vector.
pub fn declare_column_constraints(solver: &mut Solver, vars: &BasicVariables, column: &InputColumn, config: &Config) {
    let td = &vars.transition_destination;
    let tie = &vars.transition_input_event;
    let soe = &vars.state_output_event;
    let num_slots = vars.num_slots;

    for c in 1..=vars.num_states {
        for k in 1..=num_slots {
            // Null transitions never fire.
            solver.imply(td[[c, k]].eq(0), -column.transition_firing[[c, k]]);
        }

        for e in 1..=vars.num_input_events {
            let fires = |k: usize| column.event_firing[[c, e, k]];
            let ff = |k: usize| column.first_fired[[c, e, k]];
            let nf = |k: usize| column.not_fired[[c, e, k]];

            for k in 1..=num_slots {
                solver.iff_and(fires(k), &[tie[[c, k]].eq(e), column.transition_firing[[c, k]]]);
                if k == 1 {
                    solver.iff(ff(k), fires(k));
                    solver.iff(nf(k), -fires(k));
                } else {
                    solver.iff_and(ff(k), &[fires(k), nf(k - 1)]);
                    solver.iff_and(nf(k), &[-fires(k), nf(k - 1)]);
                }
            }
            let first: Vec<Lit> = (1..=num_slots).map(ff).collect();
            solver.at_most_one(&first);
            if config.encode_disjunctive_transitions {
                let firing: Vec<Lit> = (1..=num_slots).map(fires).collect();
                solver.at_most_one(&firing);
            }

            // Transition function.
            let tf = &column.transition_function[[c, e]];
            solver.iff(tf.eq(0), nf(num_slots));
            for k in 1..=num_slots {
                for d in 1..=vars.num_states {
                    solver.imply_imply(ff(k), td[[c, k]].eq(d), tf.eq(d));
                }
            }

            // Output event function.
            let oef = &column.output_event_function[[c, e]];
            solver.imply(tf.eq(0), oef.eq(0));
            for d in 1..=vars.num_states {
                for o in 0..=vars.num_output_events {
                    solver.imply_imply(tf.eq(d), soe[[d]].eq(o), oef.eq(o));
                }
            }

            // Algorithm function: no transition keeps the values.
            for z in 1..=vars.num_outputs {
                let top = column.algorithm_function_top[[c, e, z]];
                let bot = column.algorithm_function_bot[[c, e, z]];
                solver.imply(tf.eq(0), top);
                solver.imply(tf.eq(0), -bot);
                for d in 1..=vars.num_states {
                    solver.imply_iff(tf.eq(d), top, vars.state_algorithm_top[[d, z]]);
                    solver.imply_iff(tf.eq(d), bot, vars.state_algorithm_bot[[d, z]]);
                }
            }
        }
    }
}
