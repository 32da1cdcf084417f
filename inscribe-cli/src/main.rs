//! Inscribe CLI
//!
//! Command-line client for writing files and NFT metadata into on-chain
//! inscription accounts.
//!
//! # Commands
//! - `file` - Inscribe a local file into an existing inscription
//! - `nft` - Inscribe NFT JSON and media by mint
//! - `download` - Cache NFT JSON and media without inscribing
//! - `shards` - Create or dump the shard counters
//! - `fetch` - Dump inscription metadata by mint or rank
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.inscribe/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use inscribe_engine::CancellationToken;
use std::path::PathBuf;
use tracing::warn;

mod commands;
mod config;
mod metadata;
mod ui;

use commands::{download, fetch, inscribe, shards, GlobalOptions};

#[derive(Parser)]
#[command(name = "inscribe")]
#[command(about = "Write files and NFT metadata into on-chain inscription accounts")]
#[command(version)]
struct Cli {
    /// Solana RPC URL (overrides config file)
    #[arg(long, global = true, env = "INSCRIBE_RPC_URL")]
    rpc: Option<String>,

    /// Payer keypair path (overrides config file)
    #[arg(short, long, global = true, env = "INSCRIBE_KEYPAIR")]
    keypair: Option<String>,

    /// Remote calls in flight at once (overrides config file)
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,

    /// Debug logging for the inscribe crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inscribe a local file into an initialized inscription account
    File {
        /// Inscription account (the base inscription when --tag is set)
        account: String,

        /// File to inscribe
        path: PathBuf,

        /// Write into the associated inscription with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Metadata account of the inscription (derived when omitted)
        #[arg(long)]
        metadata_account: Option<String>,

        /// Simulate against an in-memory ledger and report the calls needed
        #[arg(long)]
        dry_run: bool,
    },

    /// Inscribe NFT JSON and media
    Nft {
        /// Mint address (repeatable)
        #[arg(short, long = "mint", required = true, num_args = 1..)]
        mints: Vec<String>,

        /// Do not inscribe the JSON
        #[arg(long)]
        skip_json: bool,

        /// Do not inscribe the media file
        #[arg(long)]
        skip_media: bool,

        /// Cache directory for fetched JSON and media (overrides config file)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Download off-chain content into the cache
    Download {
        #[command(subcommand)]
        command: DownloadCommands,
    },

    /// Shard counter commands
    Shards {
        #[command(subcommand)]
        command: ShardCommands,
    },

    /// Fetch inscription data
    Fetch {
        #[command(subcommand)]
        command: FetchCommands,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum DownloadCommands {
    /// Cache NFT JSON and media files by mint
    Nft {
        /// Mint address (repeatable)
        #[arg(short, long = "mint", required = true, num_args = 1..)]
        mints: Vec<String>,

        /// Cache directory (overrides config file)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ShardCommands {
    /// Create every missing shard
    Create,

    /// Dump shard counters as JSON
    Fetch {
        /// Shard numbers (all when omitted)
        numbers: Vec<u8>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum FetchCommands {
    /// Dump mint inscription metadata as JSON, ordered by rank
    Mint {
        /// Mint addresses
        #[arg(required = true)]
        mints: Vec<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dump inscription metadata as JSON by inscription rank
    Rank {
        /// Inscription ranks
        #[arg(required = true)]
        ranks: Vec<u64>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., rpc.url, inscribe.concurrency)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose {
        for directive in [
            "inscribe=debug",
            "inscribe_core=debug",
            "inscribe_ledger=debug",
            "inscribe_engine=debug",
        ] {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration from ~/.inscribe/config.toml
    let cfg = config::load_config();

    // CLI args override config file
    let options = GlobalOptions {
        rpc: cli.rpc,
        keypair: cli.keypair,
        concurrency: cli.concurrency,
    };
    let concurrency = options.driver_config(&cfg).concurrency;

    // Ctrl-C stops inscriptions at the next round boundary
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current round");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::File {
            account,
            path,
            tag,
            metadata_account,
            dry_run,
        } => {
            let config = inscribe::FileConfig {
                account,
                path,
                tag,
                metadata_account,
                dry_run,
            };
            inscribe::file(&options, &cfg, config, cancel).await?;
        }

        Commands::Nft {
            mints,
            skip_json,
            skip_media,
            cache_dir,
            yes,
        } => {
            let config = inscribe::NftConfig {
                mints,
                skip_json,
                skip_media,
                cache_dir,
                yes,
            };
            inscribe::nft(&options, &cfg, config, cancel).await?;
        }

        Commands::Download { command } => match command {
            DownloadCommands::Nft { mints, cache_dir } => {
                let ledger = options.connect_read_only(&cfg)?;
                let config = download::NftConfig {
                    mints,
                    cache_dir,
                    concurrency,
                };
                download::nft(ledger, &cfg, config).await?;
            }
        },

        Commands::Shards { command } => match command {
            ShardCommands::Create => shards::create(options.connect(&cfg)?).await?,
            ShardCommands::Fetch { numbers, output } => {
                let config = shards::FetchConfig {
                    numbers,
                    output,
                    concurrency,
                };
                shards::fetch(options.connect_read_only(&cfg)?, config).await?;
            }
        },

        Commands::Fetch { command } => {
            let ledger = options.connect_read_only(&cfg)?;
            match command {
                FetchCommands::Mint { mints, output } => {
                    let config = fetch::MintConfig {
                        mints,
                        output,
                        concurrency,
                    };
                    fetch::mint(ledger, config).await?;
                }
                FetchCommands::Rank { ranks, output } => {
                    let config = fetch::RankConfig {
                        ranks,
                        output,
                        concurrency,
                    };
                    fetch::rank(ledger, config).await?;
                }
            }
        }

        Commands::Config { command } => {
            handle_config_command(command)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config();
            println!();
            println!("{}", style("Inscribe Configuration").bold().underlined());
            println!();
            println!("{}", style("[rpc]").cyan());
            println!("  url = \"{}\"", cfg.rpc.url);
            println!("  commitment = \"{}\"", cfg.rpc.commitment);
            println!();
            println!("{}", style("[wallet]").cyan());
            match &cfg.wallet.keypair_path {
                Some(path) => println!("  keypair_path = \"{}\"", path),
                None => println!("  keypair_path = {}", style("(unset)").dim()),
            }
            println!();
            println!("{}", style("[inscribe]").cyan());
            println!("  concurrency = {}", cfg.inscribe.concurrency);
            println!("  cache_dir = \"{}\"", cfg.inscribe.cache_dir.display());
            println!();

            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("inscribe config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(ui::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::InscribeConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(ui::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config();
            if let Err(e) = cfg.set(&key, value) {
                println!("{} {}", style(ui::CROSS).red(), e);
                return Err(e.into());
            }

            config::save_config(&cfg)?;
            println!("{} Configuration updated", style(ui::CHECK).green());
        }
    }

    Ok(())
}
