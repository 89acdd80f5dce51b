//! Clause generators for the SAT reductions.

pub mod automaton;
pub mod guard;
pub mod mapping;
