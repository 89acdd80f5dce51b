use fbsat::card::Bound;
use fbsat::config::Config;
use fbsat::inferrer::Inferrer;
use fbsat::scenario::read_scenarios;
use fbsat::tree::ScenarioTree;

// The controller reacts to REQ iff exactly one of x1, x2 is set.
const SCENARIOS: &str = "\
4
in=REQ[00]
in=REQ[01]; out=CNF[1]
in=REQ[10]; out=CNF[1]
in=REQ[11]
";

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let (alphabet, scenarios) = read_scenarios(
        SCENARIOS,
        vec!["x1".to_string(), "x2".to_string()],
        vec!["z".to_string()],
        None,
    )?;
    let tree = ScenarioTree::from_scenarios(alphabet, None, scenarios)?;

    let mut inferrer = Inferrer::new(Config::default());
    for p in 2..=3 {
        let automaton = inferrer.extended(&tree, 2, Some(2), p, Bound::Unbounded, Bound::Unbounded)?;
        match automaton {
            Some(automaton) => {
                println!("P = {}: found", p);
                println!("{}", automaton);
                println!("{}", automaton.to_dot()?);
            }
            None => println!("P = {}: UNSAT", p),
        }
    }

    Ok(())
}
