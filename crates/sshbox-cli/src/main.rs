//! sshbox - disposable SSH-ready test containers

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sshbox")]
#[command(author, version, about = "Disposable SSH-ready test containers", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Driver configuration file
    #[arg(long, global = true, default_value = ".sshbox.toml")]
    config: PathBuf,

    /// Instance state file
    #[arg(long, global = true, default_value = ".sshbox/state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image, start the container and wait for SSH
    Create,

    /// Stop and remove the container
    Destroy,

    /// Print the Dockerfile that create would build
    Dockerfile,

    /// Show the recorded state and the container status
    Status,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Create => commands::create(&cli.config, &cli.state),
        Commands::Destroy => commands::destroy(&cli.config, &cli.state),
        Commands::Dockerfile => commands::dockerfile(&cli.config),
        Commands::Status => commands::status(&cli.config, &cli.state),
    }
}
