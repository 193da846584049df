/// `tin`: inspect title packages and run installs against a simulated
/// console.
///
/// # Command overview
///
/// ```text
/// tin <COMMAND> [OPTIONS]
///
/// Commands:
///   inspect    List the entries of an NSP
///   cnmt       Decode a packaged .cnmt file and show its installed record
///   install    Install an NSP into an in-memory console
///   help       Print help information
///
/// Global options:
///   -v, --verbose    Raise log level (repeat for more)
///   -h, --help       Print help
///   -V, --version    Print version
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                    |
/// |------|--------------------------------------------|
/// | 0    | Success                                    |
/// | 1    | Error (I/O failure, bad package, IPC, ...) |
///
/// Logs go to stderr; `RUST_LOG` overrides `-v`.
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tin_wire::StorageId;
use tracing_subscriber::EnvFilter;

mod cmd_cnmt;
mod cmd_inspect;
mod cmd_install;

// ── CLI root ──────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tin", version, about = "Title installation engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise the log level: -v info, -vv debug, -vvv trace.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of an NSP with kind, size and content id.
    Inspect(InspectArgs),
    /// Decode a packaged .cnmt file and show the installed record.
    Cnmt(CnmtArgs),
    /// Install an NSP into an in-memory simulated console.
    Install(InstallArgs),
}

// ── Argument structs ──────────────────────────────────────────────────────────

/// Storage volume names accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StorageArg {
    SdCard,
    BuiltInUser,
    BuiltInSystem,
}

impl From<StorageArg> for StorageId {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::SdCard => StorageId::SdCard,
            StorageArg::BuiltInUser => StorageId::BuiltInUser,
            StorageArg::BuiltInSystem => StorageId::BuiltInSystem,
        }
    }
}

#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the package.
    pub file: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `tin cnmt`.
///
/// ```text
/// ┌──────────────┬───────────────────────────────────────────────────┐
/// │ Flag         │ Effect                                            │
/// ├──────────────┼───────────────────────────────────────────────────┤
/// │ --meta-id    │ Content id of the meta content (default: zeros)   │
/// │ --meta-size  │ Size recorded for the meta content (default: 0)   │
/// │ --storage    │ Storage id written into the installed header      │
/// │ --hex        │ Hex dump of the installed record                  │
/// └──────────────┴───────────────────────────────────────────────────┘
/// ```
#[derive(clap::Args)]
pub struct CnmtArgs {
    /// Path to a packaged `.cnmt` file.
    pub file: PathBuf,

    #[arg(long)]
    pub meta_id: Option<String>,

    #[arg(long, default_value_t = 0)]
    pub meta_size: u64,

    #[arg(long, value_enum, default_value = "sd-card")]
    pub storage: StorageArg,

    #[arg(long)]
    pub hex: bool,
}

/// Arguments for `tin install`.
#[derive(clap::Args)]
pub struct InstallArgs {
    /// Path to the package.
    pub file: PathBuf,

    /// Target volume.
    #[arg(long, value_enum, default_value = "sd-card")]
    pub storage: StorageArg,

    /// Bytes per placeholder write.
    #[arg(long, default_value_t = 0x10_0000)]
    pub chunk_size: usize,

    /// Print only the final report, as JSON.
    #[arg(long)]
    pub json: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Inspect(args) => cmd_inspect::run(&args),
        Commands::Cnmt(args) => cmd_cnmt::run(&args),
        Commands::Install(args) => cmd_install::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Runtime for the async container reader and the install task.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start tokio runtime")
}

/// Entry kind from its name suffix.
pub(crate) fn entry_kind(name: &str) -> &'static str {
    if name.ends_with(".cnmt.nca") {
        "meta"
    } else if name.ends_with(".nca") {
        "content"
    } else if name.ends_with(".tik") {
        "ticket"
    } else if name.ends_with(".cert") {
        "cert"
    } else {
        "other"
    }
}
