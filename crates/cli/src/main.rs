//! Distribox CLI - distribox command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

mod cmd;
mod daemon;
mod util;

/// Distribox - peer-to-peer file synchronizer with per-file history
#[derive(Parser)]
#[command(name = "distribox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sync root (defaults to the nearest initialized ancestor of the
    /// current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a sync root in the current directory
    Init,
    /// Run the daemon: watch, version, and optionally exchange bundles
    Start {
        /// Accept bundles from peers on this address (e.g. 0.0.0.0:7117)
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// Push a bundle to this peer after every idle boundary with changes
        #[arg(long)]
        peer: Option<SocketAddr>,
    },
    /// Show version list summary
    Status,
    /// Show the event log of the history currently at NAME
    Log {
        /// Path relative to the sync root
        name: String,
    },
    /// Build a bundle of the whole version list
    Bundle {
        /// Where to write the archive
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Accept a bundle archive from disk
    Accept {
        /// Archive file to accept
        file: PathBuf,
    },
    /// Send a bundle archive to a listening peer
    Send {
        /// Archive file to send
        file: PathBuf,
        /// Peer address (host:port)
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => cmd::init::execute(cli.root),
        Commands::Start { listen, peer } => {
            let root = util::resolve_root(cli.root)?;
            daemon::run(root, listen, peer).await
        }
        Commands::Status => cmd::status::execute(cli.root),
        Commands::Log { name } => cmd::log::execute(cli.root, &name),
        Commands::Bundle { out } => cmd::bundle::execute(cli.root, &out),
        Commands::Accept { file } => cmd::accept::execute(cli.root, &file),
        Commands::Send { file, addr } => cmd::send::execute(&file, addr).await,
    }
}
