//! rexc CLI: validate, compile and explain YAML statements.

use clap::{Parser, Subcommand};
use rexc_core::config::PlannerConfig;
use rexc_planner::{compile_statement, parse_yaml_statement, Statement};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "rexc")]
#[command(about = "rexc: compile optimizer expressions into execution expressions and plan nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and check a statement YAML file
    Validate {
        /// Path to the statement YAML file
        #[arg(short, long)]
        statement: PathBuf,
    },

    /// Compile a statement and print the plan as JSON
    Compile {
        /// Path to the statement YAML file
        #[arg(short, long)]
        statement: PathBuf,

        /// Maximum expression nesting depth (overrides REXC_MAX_EXPRESSION_DEPTH)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Show the compiled plan as an indented tree (EXPLAIN)
    Explain {
        /// Path to the statement YAML file
        #[arg(short, long)]
        statement: PathBuf,

        /// Maximum expression nesting depth (overrides REXC_MAX_EXPRESSION_DEPTH)
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

fn main() {
    install_tracing_subscriber();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { statement } => {
            if let Err(e) = validate_statement(&statement) {
                eprintln!("Validation failed: {}", e);
                std::process::exit(1);
            }
            println!("✓ Statement is valid");
        }
        Commands::Compile {
            statement,
            max_depth,
            pretty,
        } => {
            if let Err(e) = compile_to_json(&statement, max_depth, pretty) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Explain {
            statement,
            max_depth,
        } => {
            if let Err(e) = explain_statement(&statement, max_depth) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_statement(path: &PathBuf) -> Result<Statement, Box<dyn std::error::Error>> {
    let yaml_content = fs::read_to_string(path)?;
    Ok(parse_yaml_statement(&yaml_content)?)
}

fn planner_config(max_depth: Option<usize>) -> PlannerConfig {
    let mut config = PlannerConfig::from_env();
    apply_cli_overrides(&mut config, max_depth);
    config
}

fn apply_cli_overrides(cfg: &mut PlannerConfig, max_depth: Option<usize>) {
    if let Some(depth) = max_depth {
        cfg.max_expression_depth = depth;
    }
}

fn validate_statement(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let _ = load_statement(path)?;
    Ok(())
}

fn compile_to_json(
    path: &PathBuf,
    max_depth: Option<usize>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let statement = load_statement(path)?;
    let config = planner_config(max_depth);
    let compiled = compile_statement(&statement, &config)?;

    let json = if pretty {
        serde_json::to_string_pretty(&compiled)?
    } else {
        serde_json::to_string(&compiled)?
    };
    println!("{}", json);
    eprintln!(
        "rexc {} fingerprint: {}",
        rexc_core::VERSION,
        compiled.fingerprint()?
    );
    Ok(())
}

fn explain_statement(
    path: &PathBuf,
    max_depth: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let statement = load_statement(path)?;
    let config = planner_config(max_depth);
    let compiled = compile_statement(&statement, &config)?;

    println!("Statement Plan");
    println!("==============");
    println!();
    if !statement.table.is_empty() {
        println!("Table: {}", statement.table);
    }
    println!("Parameters: {}", compiled.parameter_count);
    println!("Max Expression Depth: {}", config.max_expression_depth);
    println!();
    print!("{}", compiled.plan.explain());
    println!();
    println!("Fingerprint: {}", compiled.fingerprint()?);

    Ok(())
}
