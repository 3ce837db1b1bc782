use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod tui;

#[derive(Parser, Debug)]
#[command(
    name = "netlimit",
    version,
    about = "Block or throttle a running program's network traffic on Windows"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Limit a process by name; 0 in both directions blocks it entirely
    Apply {
        process: String,
        /// Inbound limit in kbps (blank or 0 for none)
        #[arg(long = "in", default_value = "")]
        inbound: String,
        /// Outbound limit in kbps (blank or 0 for none)
        #[arg(long = "out", default_value = "")]
        outbound: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove every rule and policy this tool created
    Clear {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective config
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
    /// Interactive console
    Console,
    /// Print a rendered script without running it
    Script {
        #[command(subcommand)]
        kind: ScriptCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ScriptCommand {
    Block {
        #[arg(long)]
        path: PathBuf,
    },
    Limit {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        kbps: NonZeroU32,
    },
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // init must work even when the existing config does not parse.
    if let Commands::Init { path, force } = &cli.command {
        logging::init_stderr("info");
        let paths = netlimit_core::ConfigPaths::resolve()?;
        let written = commands::config::init(path.as_deref(), *force, &paths)?;
        println!("Config written to {}", written.display());
        return Ok(());
    }

    let (config, paths) = commands::load_config(cli.config.as_deref())?;

    if let Commands::Console = cli.command {
        logging::init_file(&paths.console_log_path(&config), &config.logging.level)?;
        return tui::run_console(commands::orchestrator(&config));
    }
    logging::init_stderr(&config.logging.level);

    match cli.command {
        Commands::Apply {
            process,
            inbound,
            outbound,
            json,
        } => commands::apply::execute(
            &commands::orchestrator(&config),
            commands::apply::ApplyInputs {
                process,
                inbound,
                outbound,
                json,
            },
        ),
        Commands::Clear { json } => commands::clear::execute(&commands::orchestrator(&config), json),
        Commands::Config { path } => {
            let config_path = cli.config.unwrap_or(paths.config_path);
            println!("{}", commands::config::render(&config, &config_path, path)?);
            Ok(())
        }
        Commands::Script { kind } => {
            let request = match kind {
                ScriptCommand::Block { path } => commands::script::ScriptRequest::Block { path },
                ScriptCommand::Limit { path, kbps } => {
                    commands::script::ScriptRequest::Limit { path, kbps }
                }
                ScriptCommand::Clear => commands::script::ScriptRequest::Clear,
            };
            commands::script::execute(request)
        }
        Commands::Init { .. } | Commands::Console => Ok(()),
    }
}
