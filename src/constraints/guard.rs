//! Parse-tree guard constraints.
//!
//! Every transition slot `(c, k)` owns a parse tree of `P` nodes. Node 1 is
//! the root; a binary node with `child = ch` uses nodes `ch` and `ch + 1`,
//! a NOT node uses `ch` only. Unused (`None`) nodes come last.

use log::debug;

use crate::config::Config;
use crate::guard::NodeType;
use crate::lit::Lit;
use crate::multiarray::MultiArray;
use crate::solver::Solver;
use crate::task::{BasicVariables, ExtendedVariables};

pub fn declare_guard_constraints(solver: &mut Solver, basic: &BasicVariables, vars: &ExtendedVariables, config: &Config) {
    debug!("Declaring guard constraints: P = {}", vars.max_guard_size);
    for c in 1..=basic.num_states {
        for k in 1..=basic.num_slots {
            declare_parse_tree(solver, basic, vars, config, c, k);
        }
    }
}

fn declare_parse_tree(
    solver: &mut Solver,
    basic: &BasicVariables,
    vars: &ExtendedVariables,
    config: &Config,
    c: usize,
    k: usize,
) {
    let num_nodes = vars.max_guard_size;
    let typ = |p: usize| &vars.node_type[[c, k, p]];
    let var = |p: usize| &vars.node_input_variable[[c, k, p]];
    let parent = |p: usize| &vars.node_parent[[c, k, p]];
    let child = |p: usize| &vars.node_child[[c, k, p]];

    // Null transitions have an unused root, others a used one.
    solver.iff(basic.transition_destination[[c, k]].eq(0), typ(1).eq(NodeType::None));

    for p in 1..=num_nodes {
        // Unused nodes come last and have no links.
        let none = typ(p).eq(NodeType::None);
        if p < num_nodes {
            solver.imply(none, typ(p + 1).eq(NodeType::None));
        }
        solver.imply(none, parent(p).eq(0));
        solver.imply(none, child(p).eq(0));
        if p >= 2 {
            solver.imply(parent(p).eq(0), none);
        }

        // Terminals have an input variable and no children.
        let terminal = typ(p).eq(NodeType::Terminal);
        solver.iff(terminal, var(p).neq(0));
        solver.imply(terminal, child(p).eq(0));

        // Binary operators use `child` and `child + 1`.
        for t in [NodeType::And, NodeType::Or] {
            let is_t = typ(p).eq(t);
            let children: Vec<Lit> = ((p + 1)..num_nodes).map(|ch| child(p).eq(ch)).collect();
            solver.imply_or(is_t, &children);
            for ch in (p + 1)..num_nodes {
                solver.imply_imply(is_t, child(p).eq(ch), parent(ch).eq(p));
                solver.imply_imply(is_t, child(p).eq(ch), parent(ch + 1).eq(p));
            }
        }

        // NOT uses `child` only; double negation is forbidden.
        let not = typ(p).eq(NodeType::Not);
        let children: Vec<Lit> = ((p + 1)..=num_nodes).map(|ch| child(p).eq(ch)).collect();
        solver.imply_or(not, &children);
        for ch in (p + 1)..=num_nodes {
            solver.imply_imply(not, child(p).eq(ch), parent(ch).eq(p));
            solver.imply_imply(not, child(p).eq(ch), typ(ch).neq(NodeType::Not));
        }

        // A node claiming parent p is one of p's children.
        for x in (p + 1)..=num_nodes {
            let claims = parent(x).eq(p);
            solver.add_clause([-claims, child(p).eq(x), child(p).eq(x - 1)]);
            solver.add_clause([
                -claims,
                child(p).neq(x - 1),
                typ(p).eq(NodeType::And),
                typ(p).eq(NodeType::Or),
            ]);
        }

        if config.forbid_or {
            solver.add_clause([typ(p).neq(NodeType::Or)]);
        }
    }

    if config.bfs_guard {
        // Parents are non-decreasing.
        for p in 2..num_nodes {
            for par in 1..p {
                for par_next in 1..par {
                    solver.add_clause([parent(p).neq(par), parent(p + 1).neq(par_next)]);
                }
            }
        }
    }

    if config.encode_terminals_order {
        // Children of AND/OR are swappable: terminals go left, and sibling
        // terminals are sorted by input variable.
        for p in 1..num_nodes {
            for ch in (p + 1)..num_nodes {
                for t in [NodeType::And, NodeType::Or] {
                    solver.add_clause([
                        typ(p).neq(t),
                        child(p).neq(ch),
                        typ(ch + 1).neq(NodeType::Terminal),
                        typ(ch).eq(NodeType::Terminal),
                    ]);
                    for x in 1..=basic.num_inputs {
                        for y in 1..x {
                            solver.add_clause([typ(p).neq(t), child(p).neq(ch), var(ch).neq(x), var(ch + 1).neq(y)]);
                        }
                    }
                }
            }
        }
    }

    if config.encode_terminals_mini_order {
        for p in 1..num_nodes {
            for ch in (p + 1)..num_nodes {
                for x in 1..=basic.num_inputs {
                    for y in 1..=x {
                        for t in [NodeType::And, NodeType::Or] {
                            solver.add_clause([
                                typ(p).neq(t),
                                child(p).neq(ch),
                                var(ch).neq(x),
                                var(ch + 1).neq(y),
                            ]);
                        }
                    }
                }
            }
        }
    }
}

/// Value constraints for the node values of one input vector.
pub fn declare_guard_column_constraints(
    solver: &mut Solver,
    basic: &BasicVariables,
    vars: &ExtendedVariables,
    values: &MultiArray<Lit, 3>,
    u: usize,
) {
    let input = &basic.column(u).values;
    let num_nodes = vars.max_guard_size;
    for c in 1..=basic.num_states {
        for k in 1..=basic.num_slots {
            let typ = |p: usize| &vars.node_type[[c, k, p]];
            let child = |p: usize| &vars.node_child[[c, k, p]];
            let value = |p: usize| values[[c, k, p]];

            for p in 1..=num_nodes {
                for x in 1..=basic.num_inputs {
                    let bit = if input.get(x) { value(p) } else { -value(p) };
                    solver.imply(vars.node_input_variable[[c, k, p]].eq(x), bit);
                }
                for ch in (p + 1)..num_nodes {
                    let is_child = child(p).eq(ch);
                    let operands = [value(ch), value(ch + 1)];
                    solver.imply_imply_iff_and(typ(p).eq(NodeType::And), is_child, value(p), &operands);
                    solver.imply_imply_iff_or(typ(p).eq(NodeType::Or), is_child, value(p), &operands);
                }
                for ch in (p + 1)..=num_nodes {
                    solver.imply_imply_iff(typ(p).eq(NodeType::Not), child(p).eq(ch), value(p), -value(ch));
                }
                solver.imply(typ(p).eq(NodeType::None), -value(p));
            }
        }
    }
}
