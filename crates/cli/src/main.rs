//! Agora CLI entry point.
//!
//! Commands:
//! - `init`        Write a default config file
//! - `status`      Show the effective configuration
//! - `hello`       Run the greeter agent
//! - `sensor`      Run the periodic disaster sensor
//! - `rescue`      Run the rescue state machine
//! - `collective`  Run recon, coordinator, and watchdog together
//! - `probe`       Ask the watchdog for a single heat reading

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agora",
    about = "Agora: a multi-agent testbed",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.agora/config.toml
    #[arg(short, long, global = true, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Seed every simulated random source
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Status,

    /// Connect an agent, say hello, and leave
    Hello {
        /// Agent name (the identity is name@domain)
        #[arg(short, long, default_value = "student")]
        name: String,
    },

    /// Run the periodic disaster sensor
    Sensor {
        /// How long to run, in seconds
        #[arg(short, long)]
        secs: Option<u64>,
    },

    /// Run the rescue agent until it completes its missions
    Rescue {
        /// Missions to complete before shutting down
        #[arg(short, long)]
        missions: Option<u32>,

        /// Multiplier for every simulated delay
        #[arg(short, long)]
        time_scale: Option<f64>,
    },

    /// Run the recon / coordinator / watchdog collective
    Collective {
        /// How long to run, in seconds
        #[arg(short, long)]
        secs: Option<u64>,

        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Send one heat check to the watchdog and print the answer
    Probe {
        /// Target to ask about
        #[arg(short, long, default_value = "PaymentAPI")]
        target: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let opts = commands::GlobalOpts {
        config: cli.config,
        seed: cli.seed,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&opts, force)?,
        Commands::Status => commands::status::run(&opts)?,
        Commands::Hello { name } => commands::hello::run(&opts, &name).await?,
        Commands::Sensor { secs } => commands::sensor::run(&opts, secs).await?,
        Commands::Rescue {
            missions,
            time_scale,
        } => commands::rescue::run(&opts, missions, time_scale).await?,
        Commands::Collective { secs, json } => commands::collective::run(&opts, secs, json).await?,
        Commands::Probe { target } => commands::probe::run(&opts, &target).await?,
    }

    Ok(())
}
