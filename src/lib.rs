//! # fbsat: SAT-based inference of finite-state controllers
//!
//! **`fbsat`** infers minimal finite-state controllers (in the style of
//! IEC 61499 function-block ECCs) from behavior examples. Each example is a
//! *scenario*: a sequence of input events with input values, paired with the
//! output event and output values the controller must produce.
//!
//! ## How it works
//!
//! The search for an automaton with `C` states, at most `K` outgoing
//! transitions per state and guards of at most `P` parse-tree nodes is
//! encoded into SAT. Scenarios are merged into a prefix tree, and each tree
//! node is mapped onto an automaton state. The solver's model is decoded
//! back into an [`Automaton`][crate::automaton::Automaton].
//!
//! On top of that, a CEGIS loop model-checks every candidate against a
//! temporal specification and turns counterexamples into *negative*
//! scenarios the next candidate must not exhibit.
//!
//! ## Key Features
//!
//! - **Three levels of encoding**: [`BasicTask`][crate::task::BasicTask]
//!   (structure with truth-table guards), [`ExtendedTask`][crate::task::ExtendedTask]
//!   (parse-tree guards), [`CompleteTask`][crate::task::CompleteTask]
//!   (negative scenarios).
//! - **Incremental solving**: cardinality bounds are totalizers that can be
//!   tightened permanently or passed as assumptions, so the solver is reused
//!   across a descent on T (transitions) or N (total guard size).
//! - **1-Based Indexing**: states, events, variables, tree nodes and guard
//!   nodes are 1-indexed; `0` stands for "none".
//!
//! ## Basic Usage
//!
//! ```rust
//! use fbsat::config::Config;
//! use fbsat::inferrer::Inferrer;
//! use fbsat::scenario::read_scenarios;
//! use fbsat::tree::ScenarioTree;
//!
//! let text = "1\nin=REQ[1]; out=CNF[1]; in=REQ[0]; out=CNF[0]\n";
//! let (alphabet, scenarios) = read_scenarios(text, vec!["x".into()], vec!["z".into()], None).unwrap();
//! let tree = ScenarioTree::from_scenarios(alphabet, None, scenarios).unwrap();
//!
//! let mut inferrer = Inferrer::new(Config::default());
//! let automaton = inferrer.extended_min(&tree, None, 3).unwrap().unwrap();
//! assert!(automaton.verify(&tree));
//! println!("{}", automaton);
//! ```
//!
//! ## Core Components
//!
//! - **[`inferrer`]**: declares tasks, solves and decodes, runs minimization.
//! - **[`cegis`]**: the counterexample-guided loop and the [`ModelChecker`][crate::cegis::ModelChecker] seam.
//! - **[`solver`]**: the SAT backend adapter and clause combinators.
//! - **[`tree`]**: positive and negative scenario trees.

pub mod automaton;
pub mod card;
pub mod cegis;
pub mod config;
pub mod constraints;
pub mod counterexample;
pub mod domain;
pub mod dot;
pub mod error;
pub mod guard;
pub mod inferrer;
pub mod lit;
pub mod multiarray;
pub mod nusmv;
pub mod scenario;
pub mod solver;
pub mod task;
pub mod tree;
pub mod utils;

pub use crate::error::{Error, Result};
