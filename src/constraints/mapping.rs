//! Mapping of scenario tree nodes onto automaton states.

use log::debug;

use crate::config::Config;
use crate::lit::Lit;
use crate::solver::Solver;
use crate::task::{BasicVariables, CompleteVariables, InputColumn};
use crate::tree::Tree;

/// Literal saying that output variable `z` changes (or keeps) its value from
/// `parent` to `child` when the algorithm functions of `(c, e)` are applied.
fn algorithm_literal(column: &InputColumn, c: usize, e: usize, z: usize, parent: bool, child: bool) -> Lit {
    let top = column.algorithm_function_top[[c, e, z]];
    let bot = column.algorithm_function_bot[[c, e, z]];
    match (parent, child) {
        (true, true) => top,
        (true, false) => -top,
        (false, true) => bot,
        (false, false) => -bot,
    }
}

pub fn declare_positive_mapping_constraints(solver: &mut Solver, vars: &BasicVariables, config: &Config) {
    debug!("Declaring positive mapping constraints");
    let tree = &vars.scenario_tree;
    let mapping = &vars.mapping;
    let num_states = vars.num_states;

    solver.add_clause([mapping[[1]].eq(1)]);

    for v in 2..=tree.size() {
        let p = tree.parent(v);
        let Some(e) = tree.input_event(v).map(|e| e.index()) else {
            // No input event: nothing fires.
            for c in 1..=num_states {
                solver.imply(mapping[[p]].eq(c), mapping[[v]].eq(c));
            }
            continue;
        };
        let column = vars.column(tree.input_number(v));

        match tree.output_event(v) {
            Some(o) => {
                for i in 1..=num_states {
                    let m = mapping[[p]].eq(i);
                    let tf = &column.transition_function[[i, e]];
                    for j in 1..=num_states {
                        solver.imply_iff(m, mapping[[v]].eq(j), tf.eq(j));
                    }
                    solver.imply(m, column.output_event_function[[i, e]].eq(o.index()));
                    for z in 1..=vars.num_outputs {
                        let lit = algorithm_literal(column, i, e, z, tree.output_value(p, z), tree.output_value(v, z));
                        solver.imply(m, lit);
                    }
                    if config.encode_reverse_implication {
                        solver.imply(m, tf.neq(0));
                    }
                }
            }
            None => {
                // Either nothing fires, or a silent loop fires that keeps the values.
                for c in 1..=num_states {
                    let m = mapping[[p]].eq(c);
                    let tf = &column.transition_function[[c, e]];
                    solver.imply(m, mapping[[v]].eq(c));
                    solver.imply(m, column.output_event_function[[c, e]].eq(0));
                    solver.imply_or(m, &[tf.eq(0), tf.eq(c)]);
                    for z in 1..=vars.num_outputs {
                        let lit = algorithm_literal(column, c, e, z, tree.output_value(p, z), tree.output_value(v, z));
                        solver.imply(m, lit);
                    }
                }
            }
        }
    }
}

/// Negative mapping constraints for nodes `from..=size`, and for loop-backs
/// and rejecting nodes not declared yet.
///
/// `negMapping[v]` is the state the automaton reaches at node `v` while it
/// still reproduces the trace, or `0` once it has diverged.
pub fn declare_negative_mapping_constraints(
    solver: &mut Solver,
    basic: &BasicVariables,
    complete: &mut CompleteVariables,
    from: usize,
) {
    let tree = &complete.negative_tree;
    let num_states = basic.num_states;
    debug!(
        "Declaring negative mapping constraints for nodes {}..={}",
        from,
        tree.size()
    );

    for v in from.max(2)..=tree.size() {
        let p = tree.parent(v);
        let o = tree.output_event(v).map_or(0, |o| o.index());
        let neg_p = &complete.neg_mapping[p - 1];
        let neg_v = &complete.neg_mapping[v - 1];

        solver.imply(neg_p.eq(0), neg_v.eq(0));

        let Some(e) = tree.input_event(v).map(|e| e.index()) else {
            // No input event: nothing fires, so the step is reproduced iff it
            // is silent and keeps the values.
            if o == 0 && tree.output_values(v) == tree.output_values(p) {
                for i in 1..=num_states {
                    solver.iff(neg_p.eq(i), neg_v.eq(i));
                }
            } else {
                solver.add_clause([neg_v.eq(0)]);
            }
            continue;
        };
        let column = basic.column(tree.input_number(v));

        for i in 1..=num_states {
            let tf = &column.transition_function[[i, e]];
            let oef = column.output_event_function[[i, e]].eq(o);
            let algorithm: Vec<Lit> = (1..=basic.num_outputs)
                .map(|z| algorithm_literal(column, i, e, z, tree.output_value(p, z), tree.output_value(v, z)))
                .collect();

            // The next state is tf, or i itself if nothing fires.
            let next = |j: usize| if j == i { vec![tf.eq(j), tf.eq(0)] } else { vec![tf.eq(j)] };

            for j in 1..=num_states {
                // Mapped: the trace step is reproduced.
                let mut clause = vec![-neg_p.eq(i), -neg_v.eq(j)];
                clause.extend(next(j));
                solver.add_clause(clause);
                solver.imply_imply(neg_p.eq(i), neg_v.eq(j), oef);
                for &lit in &algorithm {
                    solver.imply_imply(neg_p.eq(i), neg_v.eq(j), lit);
                }

                // Reproduced step: the node is mapped to the next state.
                let mut clause = vec![-neg_p.eq(i), -oef];
                clause.extend(algorithm.iter().map(|&lit| -lit));
                clause.push(neg_v.eq(j));
                if j == i {
                    let mut stay = clause.clone();
                    stay.push(-tf.eq(0));
                    solver.add_clause(stay);
                }
                clause.push(-tf.eq(j));
                solver.add_clause(clause);
            }
        }
    }

    let mut new_loop_backs = Vec::new();
    for v in tree.vertices_with_loops() {
        for l in tree.loop_backs(v) {
            if !complete.declared_loop_backs.contains(&(v, l)) {
                new_loop_backs.push((v, l));
            }
        }
    }
    for &(v, l) in &new_loop_backs {
        for c in 1..=num_states {
            solver.add_clause([complete.neg_mapping[v - 1].neq(c), complete.neg_mapping[l - 1].neq(c)]);
        }
    }
    complete.declared_loop_backs.extend(new_loop_backs);

    let new_rejecting: Vec<usize> = tree
        .rejecting_vertices()
        .filter(|v| !complete.declared_rejecting.contains(v))
        .collect();
    for &v in &new_rejecting {
        solver.add_clause([complete.neg_mapping[v - 1].eq(0)]);
    }
    complete.declared_rejecting.extend(new_rejecting);
}
