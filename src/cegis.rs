//! Counterexample-guided synthesis.
//!
//! Each iteration infers an automaton consistent with the positive scenarios
//! and all negative scenarios collected so far, model-checks it, and turns
//! the counterexamples into new negative scenarios. The negative reduction
//! is extended incrementally, so the solver keeps its learnt clauses across
//! iterations.

use std::time::Instant;

use log::{debug, error, info, warn};

use crate::automaton::Automaton;
use crate::card::Bound;
use crate::counterexample::Counterexample;
use crate::error::{Error, Result};
use crate::inferrer::{Inferrer, Measure};
use crate::scenario::NegativeScenario;
use crate::task::{update_negative_reduction, BasicTask, CompleteTask, ExtendedTask};
use crate::tree::{NegativeScenarioTree, ScenarioTree, Tree};

/// Checks an automaton against the temporal specification.
pub trait ModelChecker {
    /// Counterexamples of every violated property; empty if the automaton
    /// satisfies the specification.
    fn check(&mut self, automaton: &Automaton) -> Result<Vec<Counterexample>>;

    /// Like [`check`](ModelChecker::check), but may additionally return
    /// shorter counterexamples found by bounded model checking.
    fn check_bounded(&mut self, automaton: &Automaton) -> Result<Vec<Counterexample>> {
        self.check(automaton)
    }
}

/// How the minimal CEGIS search recovers from an UNSAT bound on N.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum CegisStrategy {
    /// Use bounded counterexamples and raise N by a plain descent.
    #[default]
    Bounded,
    /// Use the null-vertex observer: assume some negative node is unmapped
    /// and drop or relax that assumption when it blocks the search.
    Assumptions,
}

impl Inferrer {
    /// Declare all three tasks and run the CEGIS loop.
    pub fn cegis<M: ModelChecker>(
        &mut self,
        checker: &mut M,
        strategy: CegisStrategy,
        basic: BasicTask,
        extended: ExtendedTask,
        negative_tree: Option<NegativeScenarioTree>,
    ) -> Result<Option<Automaton>> {
        self.reset();
        self.declare(basic)?;
        self.declare(extended)?;
        self.declare(CompleteTask::new(negative_tree))?;
        self.perform_cegis(checker, strategy)
    }

    /// Run CEGIS iterations on the declared tasks.
    ///
    /// Returns the first automaton without counterexamples, or `None` if the
    /// solver becomes UNSAT or the iteration limit is reached. Fails with
    /// [`Error::Stale`] if an iteration neither grows the negative tree nor
    /// changes the counterexamples.
    pub fn perform_cegis<M: ModelChecker>(
        &mut self,
        checker: &mut M,
        strategy: CegisStrategy,
    ) -> Result<Option<Automaton>> {
        info!("Performing CEGIS...");
        let mut last_scenarios: Option<Vec<NegativeScenario>> = None;

        for iteration in 1..=self.config.max_cegis_iterations {
            debug!("CEGIS iteration #{}", iteration);
            let time_start = Instant::now();

            update_negative_reduction(&mut self.solver, &mut self.context, &self.config)?;
            if strategy == CegisStrategy::Assumptions
                && (self.context.need_regenerate_null_vertex || self.context.null_vertex.is_none())
            {
                self.regenerate_null_vertex();
            }

            let Some(automaton) = self.infer_complete()? else {
                info!(
                    "CEGIS iteration #{} failed to infer an automaton after {:.3} s",
                    iteration,
                    time_start.elapsed().as_secs_f64()
                );
                return Ok(None);
            };

            let counterexamples = match strategy {
                CegisStrategy::Bounded => checker.check_bounded(&automaton)?,
                CegisStrategy::Assumptions => checker.check(&automaton)?,
            };
            if counterexamples.is_empty() {
                info!(
                    "CEGIS iteration #{} done in {:.3} s: no counterexamples",
                    iteration,
                    time_start.elapsed().as_secs_f64()
                );
                return Ok(Some(automaton));
            }

            let scenarios = counterexamples
                .iter()
                .map(|ce| ce.to_negative_scenario(automaton.alphabet()))
                .collect::<Result<Vec<_>>>()?;
            let complete = self.context.complete.as_mut().ok_or(Error::TaskOrder {
                task: "cegis",
                requires: "complete",
            })?;
            let shape_before = complete.negative_tree.shape();
            for scenario in &scenarios {
                complete.negative_tree.add_negative_scenario(scenario.clone())?;
            }
            let grew = complete.negative_tree.shape() != shape_before;
            if !grew && last_scenarios.as_ref() == Some(&scenarios) {
                error!("CEGIS iteration #{}: counterexamples did not change", iteration);
                return Err(Error::Stale);
            }
            info!(
                "CEGIS iteration #{} done in {:.3} s: {} counterexample(s), negative tree size {}",
                iteration,
                time_start.elapsed().as_secs_f64(),
                scenarios.len(),
                complete.negative_tree.size()
            );
            last_scenarios = Some(scenarios);
        }

        warn!("CEGIS iteration limit ({}) reached", self.config.max_cegis_iterations);
        Ok(None)
    }

    /// Pick the smallest non-root negative node that is not excluded as the
    /// new null vertex.
    fn regenerate_null_vertex(&mut self) {
        let Some(complete) = &self.context.complete else {
            return;
        };
        let candidate = (2..=complete.negative_tree.size()).find(|v| !self.context.do_not_use_vertices.contains(v));
        match candidate {
            Some(v) => {
                debug!("Null vertex: {}", v);
                self.context.null_vertex = Some(v);
                self.context.null_vertex_observer = true;
                self.context.need_regenerate_null_vertex = false;
            }
            None => {
                self.context.null_vertex = None;
                self.context.null_vertex_observer = false;
            }
        }
    }

    /// Find an automaton with minimal total guards size N that satisfies the
    /// specification.
    ///
    /// Starts from the N-minimal automaton for the positive scenarios alone
    /// and raises N each time CEGIS runs into UNSAT.
    #[allow(clippy::too_many_arguments)]
    pub fn cegis_min<M: ModelChecker>(
        &mut self,
        checker: &mut M,
        strategy: CegisStrategy,
        tree: &ScenarioTree,
        negative_tree: Option<NegativeScenarioTree>,
        number_of_states: Option<usize>,
        max_guard_size: usize,
    ) -> Result<Option<Automaton>> {
        if !self.config.use_assumptions {
            return Err(Error::Config("minimal CEGIS requires use_assumptions".to_string()));
        }

        let Some(initial) = self.extended_min(tree, number_of_states, max_guard_size)? else {
            info!("No automaton for the positive scenarios alone");
            return Ok(None);
        };
        let c = initial.number_of_states();
        let k = if self.config.reuse_k {
            initial.max_outgoing_transitions().max(1)
        } else {
            c
        };
        let mut n = initial.total_guards_size();
        info!("Initial automaton: C = {}, K = {}, P = {}, N = {}", c, k, max_guard_size, n);

        let mut negative_tree = Some(negative_tree.unwrap_or_else(|| NegativeScenarioTree::from_positive(tree)));

        for loop_number in 1..=self.config.max_cegis_loops {
            info!("CEGIS loop #{}, N = {}", loop_number, n);
            if loop_number == 1 {
                self.reset();
                self.declare(BasicTask::new(tree.clone(), c).with_max_outgoing_transitions(k))?;
                self.declare(ExtendedTask::new(max_guard_size).with_max_total_guards_size(Bound::AtMost(n)))?;
                self.declare(CompleteTask::new(negative_tree.take()))?;
                self.context.can_map_tree_to_zero = true;
                if strategy == CegisStrategy::Assumptions {
                    self.context.need_regenerate_null_vertex = true;
                }
            } else {
                self.set_bound(Measure::GuardsSize, Bound::AtMost(n))?;
            }

            let found = self.perform_cegis(checker, strategy)?;
            self.context.can_map_tree_to_zero = true;
            if let Some(automaton) = found {
                info!("Found minimal verified automaton with N = {}", automaton.total_guards_size());
                return Ok(Some(automaton));
            }
            info!("UNSAT, N = {} is too small", n);

            let observed = match (strategy, self.context.null_vertex) {
                (CegisStrategy::Assumptions, Some(v)) if self.context.null_vertex_observer => Some(v),
                _ => None,
            };
            match observed {
                None => match self.optimize_n(n + 1, Bound::Unbounded)? {
                    Some(automaton) => {
                        n = automaton.total_guards_size();
                        info!("Raised N to {}", n);
                    }
                    None => {
                        error!("No automaton even without an upper bound on N");
                        return Ok(None);
                    }
                },
                Some(null_vertex) => {
                    if !self.resolve_null_vertex(null_vertex, &mut n)? {
                        return Ok(None);
                    }
                }
            }
        }

        warn!("CEGIS loop limit ({}) reached", self.config.max_cegis_loops);
        Ok(None)
    }

    /// Decide why the search with the null vertex assumed unmapped was UNSAT.
    ///
    /// - If it stays UNSAT without a bound on N, the null vertex (and its
    ///   ancestors) must be mapped: this is fixed permanently and a new null
    ///   vertex is chosen.
    /// - If the minimal N under the assumption equals the current N, an
    ///   unmapped null vertex is only allowed for automata of at least N
    ///   nodes, and the assumption is lifted for the next loop.
    /// - Otherwise N is raised and the observer stays on.
    ///
    /// Returns `false` if no automaton exists at all.
    fn resolve_null_vertex(&mut self, null_vertex: usize, n: &mut usize) -> Result<bool> {
        self.set_bound(Measure::GuardsSize, Bound::Unbounded)?;
        let found = self.infer_complete()?;
        self.context.null_vertex_observer = false;

        let Some(automaton) = found else {
            if self.optimize_n(*n + 1, Bound::Unbounded)?.is_none() {
                error!("No automaton even without an upper bound on N");
                return Ok(false);
            }
            info!("Null vertex {} cannot be unmapped", null_vertex);
            let complete = self.context.complete.as_ref().ok_or(Error::TaskOrder {
                task: "cegis_min",
                requires: "complete",
            })?;
            let path = complete.negative_tree.path_to_root(null_vertex);
            for &x in &path {
                let mapped = complete.neg_mapping(x).neq(0);
                self.solver.add_clause([mapped]);
            }
            self.context.do_not_use_vertices.extend(path);
            self.context.need_regenerate_null_vertex = true;
            return Ok(true);
        };

        let size = automaton.total_guards_size();
        let best = if size > *n {
            self.optimize_n(*n, Bound::AtMost(size - 1))?.unwrap_or(automaton)
        } else {
            automaton
        };
        let best_n = best.total_guards_size();

        if best_n <= *n {
            info!("Null vertex {} may be unmapped only with N >= {}", null_vertex, *n);
            if let (Some(complete), Some(card)) = (&self.context.complete, &self.context.cardinality_n) {
                if *n >= 1 && *n <= card.len() {
                    for x in complete.negative_tree.path_to_root(null_vertex) {
                        self.solver.imply(complete.neg_mapping(x).eq(0), card.at_least(*n));
                    }
                }
            }
            self.context.can_map_tree_to_zero = false;
        } else {
            info!("Raised N to {} with null vertex {} unmapped", best_n, null_vertex);
            self.context.null_vertex_observer = true;
            *n = best_n;
        }
        Ok(true)
    }
}
