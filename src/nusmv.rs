//! NuSMV integration: SMV export of automata and a [`ModelChecker`] that runs
//! NuSMV through a `Makefile` in a working directory.
//!
//! The working directory must provide the targets:
//!
//! - `model` and `counterexamples`: build the model around `control.smv`,
//!   check the LTL specifications, write their output to `ltl` and the traces
//!   of false specifications to `counterexamples`;
//! - `counterexamples-min`: run the commands from `commands-min` (bounded
//!   model checking) and write the traces to `counterexamples`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use log::debug;

use crate::automaton::Automaton;
use crate::cegis::ModelChecker;
use crate::counterexample::Counterexample;
use crate::error::{Error, Result};

impl Automaton {
    /// SMV module `CONTROL` with the input events and input variables as
    /// parameters.
    ///
    /// Inputs are read with `next(...)`: the outputs of a trace state are the
    /// reaction to the inputs of the same state, so the initial state carries
    /// the initial output values only.
    pub fn to_smv(&self) -> String {
        self.to_smv_module().unwrap_or_default()
    }

    fn to_smv_module(&self) -> std::result::Result<String, std::fmt::Error> {
        let alphabet = self.alphabet();
        let next_names: Vec<String> = alphabet.input_names.iter().map(|name| format!("next({})", name)).collect();
        let params: Vec<&str> = alphabet
            .input_events
            .iter()
            .chain(&alphabet.input_names)
            .map(String::as_str)
            .collect();

        let mut smv = String::new();
        writeln!(smv, "MODULE CONTROL({})", params.join(", "))?;
        writeln!(smv, "VAR")?;
        writeln!(smv, "    _state : 1..{};", self.number_of_states().max(1))?;
        for name in &alphabet.output_events {
            writeln!(smv, "    {} : boolean;", name)?;
        }
        for name in &alphabet.output_names {
            writeln!(smv, "    {} : boolean;", name)?;
        }

        writeln!(smv, "DEFINE")?;
        let mut firing = Vec::new();
        for state in self.states() {
            for (k, t) in state.transitions.iter().enumerate() {
                let event = alphabet.input_event_name(t.input_event);
                writeln!(
                    smv,
                    "    _g{}_{} := next({}) & ({});",
                    state.id,
                    k + 1,
                    event,
                    t.guard.to_smv(&next_names)
                )?;
            }
            for k in 1..=state.transitions.len() {
                let mut condition = format!("_state = {} & _g{}_{}", state.id, state.id, k);
                for j in 1..k {
                    write!(condition, " & !_g{}_{}", state.id, j)?;
                }
                writeln!(smv, "    _t{}_{} := {};", state.id, k, condition)?;
                firing.push((state.id, k));
            }
        }

        writeln!(smv, "ASSIGN")?;
        writeln!(smv, "    init(_state) := 1;")?;
        for name in &alphabet.output_events {
            writeln!(smv, "    init({}) := FALSE;", name)?;
        }
        for (z, name) in alphabet.output_names.iter().enumerate() {
            let value = if self.initial_output_values().get(z + 1) { "TRUE" } else { "FALSE" };
            writeln!(smv, "    init({}) := {};", name, value)?;
        }

        writeln!(smv, "    next(_state) := case")?;
        for &(c, k) in &firing {
            let t = &self.state(c).transitions[k - 1];
            writeln!(smv, "        _t{}_{} : {};", c, k, t.destination)?;
        }
        writeln!(smv, "        TRUE : _state;")?;
        writeln!(smv, "    esac;")?;

        for (o, name) in alphabet.output_events.iter().enumerate() {
            let emitting: Vec<String> = firing
                .iter()
                .filter(|&&(c, k)| {
                    let t = &self.state(c).transitions[k - 1];
                    self.state(t.destination).output_event.map(|e| e.index()) == Some(o + 1)
                })
                .map(|&(c, k)| format!("_t{}_{}", c, k))
                .collect();
            let value = if emitting.is_empty() {
                "FALSE".to_string()
            } else {
                emitting.join(" | ")
            };
            writeln!(smv, "    next({}) := {};", name, value)?;
        }

        for (z, name) in alphabet.output_names.iter().enumerate() {
            writeln!(smv, "    next({}) := case", name)?;
            for &(c, k) in &firing {
                let t = &self.state(c).transitions[k - 1];
                let algorithm = &self.state(t.destination).algorithm;
                let value = match (algorithm.top()[z], algorithm.bot()[z]) {
                    (true, true) => "TRUE".to_string(),
                    (false, false) => "FALSE".to_string(),
                    (true, false) => name.clone(),
                    (false, true) => format!("!{}", name),
                };
                writeln!(smv, "        _t{}_{} : {};", c, k, value)?;
            }
            writeln!(smv, "        TRUE : {};", name)?;
            writeln!(smv, "    esac;")?;
        }
        Ok(smv)
    }
}

/// Model checker backed by NuSMV.
#[derive(Debug, Clone)]
pub struct NuSmv {
    dir: PathBuf,
}

impl NuSmv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn counterexamples_path(&self) -> PathBuf {
        self.dir.join("counterexamples")
    }

    fn run_make(&self, targets: &[&str]) -> Result<()> {
        debug!("Running 'make {}'...", targets.join(" "));
        let time_start = Instant::now();
        let status = Command::new("make")
            .args(targets)
            .current_dir(&self.dir)
            .status()
            .map_err(|e| Error::ModelChecker(format!("cannot run make: {}", e)))?;
        debug!(
            "'make {}' returned {} in {:.3} s",
            targets.join(" "),
            status,
            time_start.elapsed().as_secs_f64()
        );
        if !status.success() {
            return Err(Error::ModelChecker(format!(
                "'make {}' exited with {}",
                targets.join(" "),
                status
            )));
        }
        Ok(())
    }

    fn remove_counterexamples(&self) -> Result<()> {
        let path = self.counterexamples_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn read_counterexamples(&self) -> Result<Vec<Counterexample>> {
        let path = self.counterexamples_path();
        if path.exists() {
            Counterexample::from_file(path)
        } else {
            Ok(Vec::new())
        }
    }

    /// Write `commands-min` from the `ltl` output: one bounded check per
    /// false specification, with the bound taken from the length of its
    /// trace. Returns the number of false specifications.
    pub fn write_bounded_commands(&self) -> Result<usize> {
        let ltl = fs::read_to_string(self.dir.join("ltl"))?;
        let commands = bounded_commands(&ltl);
        fs::write(self.dir.join("commands-min"), &commands.script)?;
        Ok(commands.num_specs)
    }
}

struct BoundedCommands {
    script: String,
    num_specs: usize,
}

fn push_bounded_check(script: &mut String, spec: Option<&str>, states: usize) {
    if let Some(spec) = spec {
        script.push_str(&format!(
            "check_ltlspec_bmc_inc -k {} -l * -p \"{}\"\n",
            states.saturating_sub(1),
            spec
        ));
    }
}

fn bounded_commands(ltl: &str) -> BoundedCommands {
    let mut script = String::from("go_bmc\n");
    let mut num_specs = 0;
    let mut spec: Option<String> = None;
    let mut states = 0usize;
    for line in ltl.lines().map(str::trim) {
        if line.starts_with("-- specification") && line.ends_with("is false") {
            push_bounded_check(&mut script, spec.as_deref(), states);
            let text = line
                .trim_start_matches("-- specification")
                .trim_end_matches("is false")
                .trim();
            spec = Some(text.to_string());
            num_specs += 1;
            states = 0;
        } else if line.starts_with("-> State:") {
            states += 1;
        }
    }
    push_bounded_check(&mut script, spec.as_deref(), states);
    script.push_str("show_traces -a -v -o counterexamples\ntime\nquit\n");
    BoundedCommands { script, num_specs }
}

impl ModelChecker for NuSmv {
    fn check(&mut self, automaton: &Automaton) -> Result<Vec<Counterexample>> {
        fs::write(self.dir.join("control.smv"), automaton.to_smv())?;
        self.remove_counterexamples()?;
        self.run_make(&["model", "counterexamples"])?;
        let counterexamples = self.read_counterexamples()?;
        debug!("NuSMV found {} counterexample(s)", counterexamples.len());
        Ok(counterexamples)
    }

    /// Check, then re-check every false specification with bounded model
    /// checking to obtain shorter traces. Both sets are returned.
    fn check_bounded(&mut self, automaton: &Automaton) -> Result<Vec<Counterexample>> {
        let mut counterexamples = self.check(automaton)?;
        if counterexamples.is_empty() {
            return Ok(counterexamples);
        }
        let num_specs = self.write_bounded_commands()?;
        self.remove_counterexamples()?;
        self.run_make(&["counterexamples-min"])?;
        if !self.counterexamples_path().exists() {
            return Err(Error::ModelChecker(
                "no 'counterexamples' file after bounded model checking".to_string(),
            ));
        }
        let minimized = self.read_counterexamples()?;
        if minimized.len() != num_specs {
            return Err(Error::ModelChecker(format!(
                "wrong number of minimized counterexamples: {}, expected {}",
                minimized.len(),
                num_specs
            )));
        }
        counterexamples.extend(minimized);
        Ok(counterexamples)
    }
}
