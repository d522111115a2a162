//! gitlet: fetch history from another repository.
//!
//! # Usage
//!
//! ```bash
//! # Create a repository in the current directory
//! gitlet init
//!
//! # Register a remote (filesystem path or http(s) URL)
//! gitlet remote add origin ../other-repo
//!
//! # Copy missing objects and update remotes/origin/*
//! gitlet fetch origin
//!
//! # Show past fetches
//! gitlet fetch-log --remote origin
//! ```

mod fetch_log;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gitlet_core::{FetchService, Repository};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "gitlet")]
#[command(author = "Gitlet Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Minimal distributed version control: fetch")]
struct Cli {
    /// Directory to start repository discovery from
    #[arg(short = 'C', long = "dir", env = "GITLET_DIR", global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty repository
    Init,

    /// Manage configured remotes
    Remote {
        #[command(subcommand)]
        action: RemoteCommand,
    },

    /// Download objects and refs from a remote
    Fetch {
        /// Name of the configured remote
        remote: Option<String>,
    },

    /// Show the log of completed fetches
    #[command(name = "fetch-log")]
    FetchLog {
        /// Only show fetches from this remote
        #[arg(long)]
        remote: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum RemoteCommand {
    /// Add a remote named <name> at <url>
    Add {
        name: String,
        url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout only carries command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gitlet=warn,gitlet_core=warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli, &mut std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    tracing::debug!(dir = %dir.display(), command = ?cli.command, "running command");

    match cli.command {
        Commands::Init => cmd_init(dir, out),
        Commands::Remote {
            action: RemoteCommand::Add { name, url },
        } => cmd_remote_add(dir, &name, &url),
        Commands::Fetch { remote } => cmd_fetch(dir, remote.as_deref(), out).await,
        Commands::FetchLog { remote } => cmd_fetch_log(dir, remote.as_deref(), out),
    }
}

fn cmd_init(dir: PathBuf, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::init(&dir)?;
    writeln!(
        out,
        "Initialized empty gitlet repository in {}",
        repo.git_dir().display()
    )?;
    Ok(())
}

fn cmd_remote_add(dir: PathBuf, name: &str, url: &str) -> Result<()> {
    let repo = Repository::discover(&dir)?;
    repo.add_remote(name, url)?;
    Ok(())
}

async fn cmd_fetch(dir: PathBuf, remote: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::discover(&dir)?;
    let report = FetchService::new(&repo).fetch(remote).await?;
    write!(out, "{}", report)?;
    Ok(())
}

fn cmd_fetch_log(dir: PathBuf, remote: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let repo = Repository::discover(&dir)?;
    fetch_log::print_fetch_log(repo.git_dir(), remote, out)
}

/// `fatal:` errors exit with 128 like git; everything else with 1
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<gitlet_core::Error>() {
        Some(e) if e.is_fatal() => 128,
        _ => 1,
    }
}
