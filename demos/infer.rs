use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::eyre;
use color_eyre::Result;

use fbsat::automaton::Automaton;
use fbsat::card::Bound;
use fbsat::cegis::CegisStrategy;
use fbsat::config::Config;
use fbsat::inferrer::Inferrer;
use fbsat::nusmv::NuSmv;
use fbsat::scenario::{read_scenarios, OutputValues};
use fbsat::task::{BasicTask, ExtendedTask};
use fbsat::tree::{ScenarioTree, Tree};

#[derive(Parser)]
#[command(author, version, about = "Infer finite-state controllers from scenarios")]
struct Cli {
    /// Scenarios file
    #[arg(short, long, value_name = "FILE")]
    scenarios: PathBuf,

    /// Comma-separated input variable names
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    input_names: Vec<String>,

    /// Comma-separated output variable names
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    output_names: Vec<String>,

    /// Initial output values, e.g. "010"
    #[arg(long, value_name = "BITS")]
    initial_output_values: Option<String>,

    /// Directory for the inferred automaton (DOT and SMV)
    #[arg(short, long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    #[arg(long)]
    forbid_or: bool,

    #[arg(long)]
    encode_terminals_order: bool,

    #[arg(long)]
    no_bfs_guard: bool,

    /// Bound cardinalities by permanent clauses instead of assumptions
    #[arg(long)]
    no_assumptions: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, ValueEnum)]
enum Strategy {
    Bounded,
    Assumptions,
}

impl From<Strategy> for CegisStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Bounded => CegisStrategy::Bounded,
            Strategy::Assumptions => CegisStrategy::Assumptions,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Automaton with C states and truth-table guards
    Basic {
        #[arg(short = 'C', long)]
        states: usize,
        #[arg(short = 'K', long)]
        max_outgoing: Option<usize>,
        #[arg(short = 'T', long)]
        max_transitions: Option<usize>,
    },

    /// Minimal C, then minimal T
    BasicMin,

    /// Automaton with C states and parse-tree guards
    Extended {
        #[arg(short = 'C', long)]
        states: usize,
        #[arg(short = 'K', long)]
        max_outgoing: Option<usize>,
        #[arg(short = 'P', long)]
        max_guard_size: usize,
        #[arg(short = 'N', long)]
        max_total_guards_size: Option<usize>,
    },

    /// Minimal N for the given (or minimal) C
    ExtendedMin {
        #[arg(short = 'C', long)]
        states: Option<usize>,
        #[arg(short = 'P', long)]
        max_guard_size: usize,
    },

    /// CEGIS with NuSMV in SMV_DIR
    Cegis {
        #[arg(short = 'C', long)]
        states: usize,
        #[arg(short = 'K', long)]
        max_outgoing: Option<usize>,
        #[arg(short = 'P', long)]
        max_guard_size: usize,
        #[arg(long, value_name = "SMV_DIR")]
        smv_dir: PathBuf,
        #[arg(long, value_enum, default_value = "bounded")]
        strategy: Strategy,
    },

    /// CEGIS with minimal N
    CegisMin {
        #[arg(short = 'C', long)]
        states: Option<usize>,
        #[arg(short = 'P', long)]
        max_guard_size: usize,
        #[arg(long, value_name = "SMV_DIR")]
        smv_dir: PathBuf,
        #[arg(long, value_enum, default_value = "bounded")]
        strategy: Strategy,
    },
}

fn write_outputs(automaton: &Automaton, outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)?;
    fs::write(outdir.join("automaton.dot"), automaton.to_dot()?)?;
    fs::write(outdir.join("control.smv"), automaton.to_smv())?;
    log::info!("Automaton written to {:?}", outdir);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    simplelog::TermLogger::init(
        cli.log_level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let initial = match &cli.initial_output_values {
        Some(bits) => Some(OutputValues::parse(bits).ok_or_else(|| eyre!("Bad output values: {}", bits))?),
        None => None,
    };

    log::info!("Loading scenarios from {:?}", cli.scenarios);
    let text = fs::read_to_string(&cli.scenarios)?;
    let (alphabet, scenarios) = read_scenarios(&text, cli.input_names, cli.output_names, initial.as_ref())?;
    let tree = ScenarioTree::from_scenarios(alphabet, initial.clone(), scenarios)?;
    log::info!(
        "Scenario tree: {} nodes, {} unique inputs",
        tree.size(),
        tree.unique_inputs().len()
    );

    let config = Config {
        initial_output_values: initial,
        forbid_or: cli.forbid_or,
        encode_terminals_order: cli.encode_terminals_order,
        bfs_guard: !cli.no_bfs_guard,
        use_assumptions: !cli.no_assumptions,
        ..Config::default()
    };
    let mut inferrer = Inferrer::new(config);

    let automaton = match cli.command {
        Commands::Basic {
            states,
            max_outgoing,
            max_transitions,
        } => inferrer.basic(&tree, states, max_outgoing, Bound::from(max_transitions))?,

        Commands::BasicMin => inferrer.basic_min(&tree)?,

        Commands::Extended {
            states,
            max_outgoing,
            max_guard_size,
            max_total_guards_size,
        } => inferrer.extended(
            &tree,
            states,
            max_outgoing,
            max_guard_size,
            Bound::Unbounded,
            Bound::from(max_total_guards_size),
        )?,

        Commands::ExtendedMin { states, max_guard_size } => inferrer.extended_min(&tree, states, max_guard_size)?,

        Commands::Cegis {
            states,
            max_outgoing,
            max_guard_size,
            smv_dir,
            strategy,
        } => {
            let mut basic = BasicTask::new(tree.clone(), states);
            if let Some(k) = max_outgoing {
                basic = basic.with_max_outgoing_transitions(k);
            }
            let mut checker = NuSmv::new(smv_dir);
            inferrer.cegis(
                &mut checker,
                strategy.into(),
                basic,
                ExtendedTask::new(max_guard_size),
                None,
            )?
        }

        Commands::CegisMin {
            states,
            max_guard_size,
            smv_dir,
            strategy,
        } => {
            let mut checker = NuSmv::new(smv_dir);
            inferrer.cegis_min(&mut checker, strategy.into(), &tree, None, states, max_guard_size)?
        }
    };

    match automaton {
        Some(automaton) => {
            println!("{}", automaton);
            if let Some(outdir) = &cli.outdir {
                write_outputs(&automaton, outdir)?;
            }
        }
        None => println!("No automaton found"),
    }

    Ok(())
}
