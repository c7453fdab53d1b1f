//! nsinit

#![deny(clippy::all)]
#![deny(missing_docs)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use nix::unistd::Pid;
use nsinit::{
    config::{self, InitConfig},
    init::{Init, Terminal},
    network::{self, Network, NetworkState},
};
use std::{path::PathBuf, process::exit};

mod logger;

/// Container init
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Opt {
    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set up the current process and execute the container command
    Init {
        /// Init configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Network setup
    #[command(subcommand)]
    Network(NetworkCommand),
}

#[derive(Debug, Subcommand)]
enum NetworkCommand {
    /// Create the host side of a network for a container process. Prints
    /// the resulting state.
    Create {
        /// Network configuration
        #[arg(short, long)]
        config: PathBuf,
        /// Pid of the container process
        #[arg(short, long)]
        pid: i32,
    },
    /// Configure the container side of a network. Runs inside the network
    /// namespace of the container.
    Initialize {
        /// Network configuration
        #[arg(short, long)]
        config: PathBuf,
        /// State printed by `create`
        #[arg(short, long)]
        state: PathBuf,
    },
}

fn main() {
    let opt = Opt::parse();
    logger::init(opt.log_level);

    if let Err(e) = run(opt.command) {
        error!("{:?}", e);
        exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Init { config } => {
            let config = InitConfig::from_path(&config).context("failed to load configuration")?;
            match Init::new(config).run()? {
                Terminal::Killed => info!("Parent died before exec"),
                Terminal::Exec => info!("Returned from exec"),
            }
        }
        Command::Network(NetworkCommand::Create { config, pid }) => {
            let network = config::read::<Network>(&config)?;
            let mut state = NetworkState::default();
            network::get_strategy(&network.r#type)?
                .create(&network, Pid::from_raw(pid), &mut state)
                .with_context(|| format!("failed to create {} network", network.r#type))?;
            let state = toml::to_string(&state).context("failed to serialize network state")?;
            print!("{state}");
        }
        Command::Network(NetworkCommand::Initialize { config, state }) => {
            let network = config::read::<Network>(&config)?;
            let state = config::read::<NetworkState>(&state)?;
            network::get_strategy(&network.r#type)?
                .initialize(&network, &state)
                .with_context(|| format!("failed to initialize {} network", network.r#type))?;
        }
    }
    Ok(())
}
