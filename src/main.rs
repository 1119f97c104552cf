/*!
 * satctl CLI - Command Line Interface
 */

use clap::{Parser, Subcommand, ValueEnum};
use satctl::{
    cli_style::print_error,
    commands::{self, Context},
    config::{LogLevel, SatConfig},
    error::{Result, SatError, EXIT_SUCCESS},
    logging,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "satctl")]
#[command(version, about = "Deploy, upgrade and connect satellite contracts across chains", long_about = None)]
struct Cli {
    /// Configuration file (default: ./satctl.toml, then the user config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage deployment environments
    #[command(subcommand)]
    Env(EnvCommands),

    /// Deploy, remove, upgrade and list satellites
    #[command(subcommand)]
    Satellite(SatelliteCommands),

    /// Register, remove and list connections between satellites
    #[command(subcommand)]
    Connection(ConnectionCommands),

    /// Print the 4-byte selectors of an ABI
    Selectors {
        /// ABI or artifact JSON file, or a contract name in the build output
        artifact: String,

        /// List custom error selectors instead of functions
        #[arg(long)]
        errors: bool,
    },
}

#[derive(Subcommand)]
enum EnvCommands {
    /// List environments, marking the active one
    List,
    /// Create an empty environment and make it active
    Create { name: String },
    /// Switch the active environment
    Change { name: String },
    /// Delete an inactive environment
    Delete { name: String },
}

#[derive(Subcommand)]
enum SatelliteCommands {
    /// Deploy the satellite of a chain (decimal id or short name like SN_SEPOLIA)
    Deploy { chain: String },
    /// Forget a satellite that has no connections
    Remove { chain: String },
    /// Bring a satellite's facets in line with the current build
    Upgrade {
        chain: String,

        /// Apply every change without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// List satellites of the active environment
    List,
}

#[derive(Subcommand)]
enum ConnectionCommands {
    /// Let the satellite on FROM send messages to the satellite on TO
    Register { from: String, to: String },
    /// Remove the FROM -> TO connection on both ends
    Remove { from: String, to: String },
    /// List connections of the active environment
    List,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            print_error(&e.to_string(), hint(&e));
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn hint(error: &SatError) -> Option<&'static str> {
    match error {
        SatError::PartialConnection { .. } => {
            Some("on-chain registrations differ from the environment file; finish or undo them by hand")
        }
        SatError::Corrupt { .. } => Some("repair the environment file before running further commands"),
        SatError::UnresolvedAddress(_) => Some("no transaction was sent"),
        SatError::Timeout { .. } => Some("raise the matching [timeouts] entry if the tool is just slow"),
        _ => None,
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = SatConfig::discover(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let ctx = Context::new(config)?;
    match cli.command {
        Commands::Env(command) => match command {
            EnvCommands::List => commands::environment::list(&ctx),
            EnvCommands::Create { name } => commands::environment::create(&ctx, &name),
            EnvCommands::Change { name } => commands::environment::change(&ctx, &name),
            EnvCommands::Delete { name } => commands::environment::delete(&ctx, &name),
        },
        Commands::Satellite(command) => match command {
            SatelliteCommands::Deploy { chain } => {
                block_on(commands::satellite::deploy(&ctx, &chain))
            }
            SatelliteCommands::Remove { chain } => commands::satellite::remove(&ctx, &chain),
            SatelliteCommands::Upgrade { chain, yes } => {
                block_on(commands::satellite::upgrade(&ctx, &chain, yes))
            }
            SatelliteCommands::List => commands::satellite::list(&ctx),
        },
        Commands::Connection(command) => match command {
            ConnectionCommands::Register { from, to } => {
                block_on(commands::connection::register(&ctx, &from, &to))
            }
            ConnectionCommands::Remove { from, to } => {
                block_on(commands::connection::remove(&ctx, &from, &to))
            }
            ConnectionCommands::List => commands::connection::list(&ctx),
        },
        Commands::Selectors { artifact, errors } => {
            commands::selectors::print(&ctx, &artifact, errors)
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| SatError::Other(format!("Failed to start async runtime: {}", e)))?;
    runtime.block_on(future)
}
