//! Fast EDH CLI
//!
//! Thin wrapper around fastedh-core for driving a table from the terminal.
//! Every invocation is one browsing context over the durable store in the
//! data directory, so state carries over between runs.
//!
//! ## Usage
//!
//! ```bash
//! # Seat a player
//! fastedh player add 1 --name "Atraxa" --grid-area a
//!
//! # Lose 3 life, gain 1
//! fastedh player life 1 -3
//! fastedh player life 1 1
//!
//! # Quarter-turn a seat
//! fastedh player rotate 1
//!
//! # Run player 1's clock for 30 ticks
//! fastedh timer run 1 --seconds 30
//!
//! # Show what a build would precache
//! fastedh cache plan build/manifest.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fastedh_core::logging::LoggingBuilder;
use fastedh_core::{
    AssetManifest, BrowsingContext, Origin, PersistentCell, Player, PlayerId, PlayerSeed,
    RedbStore, Rotation, TimerOptions, TrackerConfig,
};

/// Durable key holding the seating chart
const SEATS_KEY: &str = "players";

/// Fast EDH - Commander life and clock tracker
#[derive(Parser)]
#[command(name = "fastedh")]
#[command(version = "0.1.0")]
#[command(about = "Fast EDH - Commander life and clock tracker")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.fastedh/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSONL logs under this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show data directory, configuration and seated players
    Info,

    /// Player management
    Player {
        #[command(subcommand)]
        action: PlayerAction,
    },

    /// Player clocks
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Offline cache tooling
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum PlayerAction {
    /// Seat a new player
    Add {
        /// Player id, unique at the table
        id: PlayerId,
        #[arg(short, long)]
        name: Option<String>,
        /// Starting life (default from config)
        #[arg(short, long, allow_negative_numbers = true)]
        life: Option<i64>,
        /// Seat orientation in degrees: 0, 90, 180 or 270
        #[arg(short, long, default_value_t = 0)]
        rotation: u16,
        #[arg(short, long, default_value = "")]
        grid_area: String,
        /// Starting clock in seconds (default from config)
        #[arg(short, long, allow_negative_numbers = true)]
        time: Option<i64>,
    },
    /// List seated players
    List,
    /// Show one player
    Show { id: PlayerId },
    /// Change life by a signed amount
    Life {
        id: PlayerId,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    /// Rename a player
    Rename { id: PlayerId, name: String },
    /// Turn a seat a quarter clockwise
    Rotate { id: PlayerId },
}

#[derive(Subcommand)]
enum TimerAction {
    /// Show a player's clock
    Show { id: PlayerId },
    /// Run a player's clock for a number of ticks, then pause
    Run {
        id: PlayerId,
        #[arg(short, long)]
        seconds: u32,
    },
    /// Return a player's clock to its starting time
    Reset { id: PlayerId },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the cache region and assets a build manifest would precache
    Plan { manifest: PathBuf },
}

/// Install the global subscriber for this invocation.
fn setup_logging(verbosity: u8, log_dir: Option<&Path>) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let mut builder = LoggingBuilder::new("cli").with_filter(filter);
    if let Some(dir) = log_dir {
        builder = builder.with_logs_dir(dir);
    }
    builder.init().context("Failed to initialise logging")?;
    Ok(())
}

/// Get the default data directory (~/.fastedh/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fastedh")
        .join("data")
}

/// The table as the CLI sees it: one context plus the seating chart.
struct Table {
    context: BrowsingContext,
    config: TrackerConfig,
    seats: PersistentCell<Vec<PlayerSeed>>,
}

impl Table {
    fn open(data_dir: &Path, config: TrackerConfig) -> Result<Self> {
        let store = RedbStore::open(data_dir.join("local.redb"))
            .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
        let context = Origin::new(store).open_context();
        let seats = PersistentCell::new(Some(&context), SEATS_KEY, Vec::new());
        Ok(Self {
            context,
            config,
            seats,
        })
    }

    fn seat(&self, id: PlayerId) -> Result<PlayerSeed> {
        self.seats
            .with(|seats| seats.iter().find(|seat| seat.id == id).cloned())
            .with_context(|| format!("No player with id {}", id))
    }

    fn player(&self, id: PlayerId) -> Result<Player> {
        let seat = self.seat(id)?;
        Ok(Player::new(
            Some(&self.context),
            seat,
            TimerOptions::from_config(&self.config),
        ))
    }
}

fn print_player(player: &Player) {
    let name = player.name();
    println!(
        "Player {}: {}",
        player.id(),
        if name.is_empty() { "(unnamed)" } else { name.as_str() }
    );
    println!("  Life: {}", player.life());
    println!(
        "  Clock: {} ({})",
        player.timer().formatted(),
        player.timer().state()
    );
    println!("  Rotation: {}", player.rotation());
    if !player.grid_area().is_empty() {
        println!("  Grid area: {}", player.grid_area());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.log_dir.as_deref())?;

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config_path = cli.config.unwrap_or_else(|| data_dir.join("config.json"));
    let config = TrackerConfig::load(&config_path)?;

    match cli.command {
        Commands::Info => {
            let table = Table::open(&data_dir, config)?;
            println!("Fast EDH v0.1.0");
            println!();
            println!("Data directory: {}", data_dir.display());
            println!("Config: {}", config_path.display());
            println!("  Expiry policy: {:?}", table.config.expiry_policy);
            println!("  Tick period: {}ms", table.config.tick_period().as_millis());
            println!("  Long press: {}ms", table.config.long_press().as_millis());
            println!("  Base path: {}", table.config.base_path);
            println!("  Cache activation: {:?}", table.config.activation);
            println!("Players seated: {}", table.seats.with(Vec::len));
        }

        Commands::Player { action } => {
            let table = Table::open(&data_dir, config)?;
            match action {
                PlayerAction::Add {
                    id,
                    name,
                    life,
                    rotation,
                    grid_area,
                    time,
                } => {
                    if table.seat(id).is_ok() {
                        bail!("Player {} is already seated", id);
                    }
                    let rotation = Rotation::try_from(rotation)?;
                    let seed = PlayerSeed {
                        id,
                        name: name.unwrap_or_default(),
                        life: life.unwrap_or(table.config.default_life),
                        rotation,
                        grid_area,
                        initial_time: time.unwrap_or(table.config.default_time_seconds),
                    };
                    table.seats.update(|seats| seats.push(seed));

                    let player = table.player(id)?;
                    println!("Seated player {}", id);
                    print_player(&player);
                    player.dispose();
                }
                PlayerAction::List => {
                    let seats = table.seats.get();
                    if seats.is_empty() {
                        println!("No players seated.");
                    }
                    for seat in seats {
                        let player = table.player(seat.id)?;
                        println!(
                            "  {}  {:<20} {:>4}  {}",
                            player.id(),
                            player.name(),
                            player.life(),
                            player.timer().formatted()
                        );
                        player.dispose();
                    }
                }
                PlayerAction::Show { id } => {
                    let player = table.player(id)?;
                    print_player(&player);
                    player.dispose();
                }
                PlayerAction::Life { id, delta } => {
                    let player = table.player(id)?;
                    player.adjust_life(delta);
                    println!("Player {} life: {}", id, player.life());
                    player.dispose();
                }
                PlayerAction::Rename { id, name } => {
                    let player = table.player(id)?;
                    player.set_name(name);
                    println!("Player {} renamed to {}", id, player.name());
                    player.dispose();
                }
                PlayerAction::Rotate { id } => {
                    let rotation = table.seat(id)?.rotation.rotate_clockwise();
                    table.seats.update(|seats| {
                        if let Some(seat) = seats.iter_mut().find(|seat| seat.id == id) {
                            seat.rotation = rotation;
                        }
                    });
                    println!("Player {} rotation: {}", id, rotation);
                }
            }
        }

        Commands::Timer { action } => {
            let table = Table::open(&data_dir, config)?;
            match action {
                TimerAction::Show { id } => {
                    let player = table.player(id)?;
                    println!("Player {} clock: {}", id, player.timer().formatted());
                    player.dispose();
                }
                TimerAction::Run { id, seconds } => {
                    let player = table.player(id)?;
                    let ticks = run_clock(&player, seconds).await?;
                    println!(
                        "Player {} clock: {} after {} ticks",
                        id,
                        player.timer().formatted(),
                        ticks
                    );
                    player.dispose();
                }
                TimerAction::Reset { id } => {
                    let player = table.player(id)?;
                    player.timer().reset();
                    println!("Player {} clock: {}", id, player.timer().formatted());
                    player.dispose();
                }
            }
        }

        Commands::Cache { action } => match action {
            CacheAction::Plan { manifest } => {
                let manifest = AssetManifest::load(&manifest)
                    .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
                println!("Cache: {}", manifest.cache_name());
                println!("Assets ({}):", manifest.len());
                for asset in manifest.assets() {
                    println!("  {}", asset);
                }
            }
        },
    }

    Ok(())
}

/// Run the clock for up to `ticks` ticks and wait for it to pause itself.
/// Returns how many seconds the clock moved.
async fn run_clock(player: &Player, ticks: u32) -> Result<u64> {
    let timer = player.timer();
    let before = timer.time_seconds();
    let mut time = timer.watch();

    timer.start_for(ticks)?;
    while !timer.is_paused() {
        if time.changed().await.is_err() {
            break;
        }
    }
    Ok(before.abs_diff(timer.time_seconds()))
}
