use std::{fs, process};

use cadexpr::{Engine, config::EngineConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

/// cadexpr evaluates unit-aware expressions and scripts against a scratch
/// CAD document.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Tells cadexpr to read the script from the file named by the contents.
    #[arg(short, long)]
    file: bool,

    /// Engine configuration file (TOML).
    #[arg(short, long)]
    config: Option<String>,

    /// Prints the simplified expression instead of its value.
    #[arg(short, long)]
    simplify: bool,

    /// Prints the identifiers the expression depends on instead of its
    /// value.
    #[arg(short, long)]
    deps: bool,

    /// Prints the persistent (saved) spelling of the expression instead of
    /// its value. Combined with `--simplify` it applies to the simplified
    /// expression.
    #[arg(short, long)]
    persistent: bool,

    /// Logs evaluation details; `RUST_LOG` takes precedence.
    #[arg(short, long)]
    verbose: bool,

    contents: String,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                     EnvFilter::new(if verbose { "cadexpr=debug" } else { "warn" })
                 });
    fmt().with_env_filter(filter)
         .with_target(false)
         .with_writer(std::io::stderr)
         .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| {
                                                  eprintln!("{e}");
                                                  process::exit(1);
                                              }),
        None => EngineConfig::default(),
    };

    let script = if args.file {
        fs::read_to_string(&args.contents).unwrap_or_else(|_| {
            eprintln!("Failed to read the input file '{}'. Perhaps this file does not exist?",
                      &args.contents);
            process::exit(1);
        })
    } else {
        args.contents.clone()
    };

    let mut engine = Engine::with_config(config);
    if let Err(e) = run(&mut engine, &script, &args) {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn run(engine: &mut Engine, script: &str, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let expression = engine.parse(script)?;

    if args.deps {
        for (identifier, hidden) in expression.dependencies() {
            if hidden {
                println!("{identifier} (hidden)");
            } else {
                println!("{identifier}");
            }
        }
        return Ok(());
    }

    if args.simplify || args.persistent {
        let expression = if args.simplify {
            expression.simplify()
        } else {
            expression
        };
        println!("{}", expression.to_source(args.persistent));
        return Ok(());
    }

    let value = engine.context_mut().evaluate_expression(&expression)?;
    println!("{value}");
    Ok(())
}
