//! Regress - replay YAML test scripts through the harness
//!
//! Exit status: 0 when the run is successful, 1 when any test recorded a
//! failure or error, 2 when the harness itself could not run.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use regress_harness::runner::{self, TestRunner};
use regress_harness::script::{ScriptSession, ScriptSessions, TestScript};
use regress_harness::{HarnessConfig, TestCase};

#[derive(Parser, Debug)]
#[command(name = "regress")]
#[command(author, version, about = "Replay YAML test scripts through the regression harness")]
struct Args {
    /// Path to test scripts directory
    #[arg(short, long, default_value = "tests/scripts")]
    scripts: PathBuf,

    /// Harness configuration file
    #[arg(short, long, default_value = "regress.toml")]
    config: PathBuf,

    /// Run only tests carrying this tag (repeatable)
    #[arg(short, long)]
    tag: Vec<String>,

    /// Run only a specific test by name
    #[arg(short, long)]
    name: Option<String>,

    /// Render full call stacks in failure details
    #[arg(long)]
    debug: bool,

    /// Root of the suite source used to trim call stacks
    #[arg(long)]
    suite_root: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();
    runner::log_panics();

    match run(args) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::load(&args.config)?;
    config.debug |= args.debug;
    if let Some(root) = args.suite_root {
        config.suite_root = root;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if !args.tag.is_empty() {
        config.tags = args.tag;
    }

    let cases: Vec<Box<dyn TestCase<ScriptSession>>> = TestScript::load_all(&args.scripts)?
        .into_iter()
        .map(|script| Box::new(script) as Box<dyn TestCase<ScriptSession>>)
        .collect();

    let mut runner = TestRunner::with_config(ScriptSessions::default(), &config);
    let report = match args.name {
        Some(name) => runner.run_test(&cases, &name)?,
        None => runner.run(&cases),
    };

    print!("{}", report.render());
    report.write_json(&config.output_dir)?;

    Ok(report.success)
}
