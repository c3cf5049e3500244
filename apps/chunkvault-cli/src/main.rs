use chunkvault_common::GameMode;
use chunkvault_provider::Provider;
use chunkvault_store::FileProvider;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chunkvault-cli", about = "CLI tool for chunkvault world stores")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a world store directory
    Init {
        /// Store directory
        path: PathBuf,
        /// World name to record in the metadata
        #[arg(short, long, default_value = "world")]
        name: String,
        /// Default game mode for newly joining players
        #[arg(short, long, default_value = "adventure")]
        mode: String,
    },
    /// Print metadata and saved chunks of a store
    Info {
        /// Store directory
        path: PathBuf,
    },
    /// Recompute payload hashes and report corruption
    Verify {
        /// Store directory
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init { path, name, mode } => {
            let mode: GameMode = mode
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid --mode: {e}"))?;
            let mut store = FileProvider::open(&path)?;
            store.set_world_name(&name);
            store.set_default_game_mode(mode);
            store.close()?;
            println!("Initialized store {:?} (name: {name}, mode: {mode})", path);
        }
        Commands::Info { path } => {
            let store = FileProvider::open(&path)?;
            println!("name:       {}", store.world_name());
            println!("spawn:      {}", store.world_spawn());
            println!("time:       {} ticks", store.load_time());
            println!(
                "time cycle: {}",
                if store.load_time_cycle() { "running" } else { "stopped" }
            );
            println!("game mode:  {}", store.default_game_mode());

            let chunks = store.saved_chunks();
            println!("chunks:     {}", chunks.len());
            for pos in chunks {
                println!("  {pos}");
            }
        }
        Commands::Verify { path } => {
            let store = FileProvider::open(&path)?;
            match store.verify_integrity() {
                Ok(()) => println!("OK: all payload hashes verified"),
                Err(e) => {
                    println!("CORRUPT: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
