//! `dres`: a demo CLI that loads a target manifest, resolves a goal against
//! an in-memory fact store, and reports the outcome (§6 expansion — the CLI
//! is ambient tooling, not part of the resolver's own public surface).

mod config;
mod demo_methods;
mod manifest;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use config::CliConfig;
use dres_resolver::{GoalOutcome, ResolverEngine};
use dres_store::MemoryStore;
use dres_vm::disasm::disassemble;
use manifest::Manifest;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dres")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve a target manifest's dependency graph against an in-memory fact store")]
struct Cli {
    /// Path to an optional TOML settings file (§0 expansion).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a goal target against the manifest's in-memory fact store.
    Resolve {
        /// Path to a target manifest TOML file.
        manifest: PathBuf,

        /// Goal target to resolve (defaults to the config's `default_goal`).
        #[arg(long)]
        goal: Option<String>,
    },

    /// Print the disassembly of every action attached to one target.
    Disasm {
        manifest: PathBuf,
        target: String,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|s| {
            CliConfig::from_toml(&s).map_err(|e| e.to_string())
        }) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error reading config {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => CliConfig::new(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_filter.parse().unwrap()),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Resolve { manifest, goal } => run_resolve(&manifest, goal.or(config.default_goal)),
        Commands::Disasm { manifest, target } => run_disasm(&manifest, &target),
        Commands::Completions { shell } => {
            run_completions(shell);
            ExitCode::SUCCESS
        }
    }
}

fn load_manifest(path: &PathBuf) -> Result<Manifest, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Manifest::parse(&contents).map_err(|e| e.to_string())
}

fn run_resolve(manifest_path: &PathBuf, goal: Option<String>) -> ExitCode {
    let Some(goal) = goal else {
        eprintln!("no goal given: pass --goal or set default_goal in --config");
        return ExitCode::FAILURE;
    };

    let manifest = match load_manifest(manifest_path) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "failed to load manifest");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = ResolverEngine::new(MemoryStore::new());
    demo_methods::install(&mut engine);
    if let Err(e) = manifest::install(&mut engine, &manifest) {
        error!(error = %e, "failed to install manifest");
        return ExitCode::FAILURE;
    }

    match engine.update_goal(&goal) {
        Ok(GoalOutcome::Success) => {
            info!(goal = %goal, "goal resolved");
            ExitCode::SUCCESS
        }
        Ok(GoalOutcome::Silent) => {
            info!(goal = %goal, "goal resolution produced a silent failure");
            ExitCode::from(1)
        }
        Ok(GoalOutcome::Exception { code, message, locals_dump }) => {
            error!(goal = %goal, code, message = %message, locals_dump = ?locals_dump, "goal resolution raised an exception");
            ExitCode::from((-code).clamp(1, 255) as u8)
        }
        Err(e) => {
            error!(goal = %goal, error = %e, "goal resolution aborted");
            ExitCode::from(e.exit_code().unsigned_abs().clamp(1, 255) as u8)
        }
    }
}

fn run_disasm(manifest_path: &PathBuf, target_name: &str) -> ExitCode {
    let manifest = match load_manifest(manifest_path) {
        Ok(m) => m,
        Err(e) => {
            error!(error = %e, "failed to load manifest");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = ResolverEngine::new(MemoryStore::new());
    demo_methods::install(&mut engine);
    if let Err(e) = manifest::install(&mut engine, &manifest) {
        error!(error = %e, "failed to install manifest");
        return ExitCode::FAILURE;
    }

    let Some(id) = engine.tables().target_lookup(target_name) else {
        eprintln!("no such target: {target_name}");
        return ExitCode::FAILURE;
    };
    let target = engine.tables().target(id).expect("lookup just found this id");

    for action in &target.actions {
        println!("; action {}", action.name);
        match disassemble(&action.chunk) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("could not disassemble {}: {e}", action.name);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
