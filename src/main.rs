//! srs-versus command line
//!
//! `relay` runs the match server, `simulate` plays a seeded game with the
//! autoplayer and prints its statistics, `bot` joins a relay and plays a
//! versus match on its own.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use srs_versus::autoplay;
use srs_versus::engine::{Engine, EngineEvent};
use srs_versus::multiplayer::{NetEvent, VersusSession, check_relay_addr};
use srs_versus::relay;
use srs_versus::settings::Settings;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Bot loop rate
const TICK: Duration = Duration::from_millis(16);
/// Pause between two bot placements
const BOT_MOVE_INTERVAL: Duration = Duration::from_millis(400);
/// Simulated time between placements in `simulate`
const SIMULATE_STEP: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "srs-versus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the match relay
    Relay {
        /// Address to listen on, defaults to the configured relay address
        #[arg(long)]
        addr: Option<String>,
    },
    /// Play a seeded game with the autoplayer and print statistics
    Simulate {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Stop after this many pieces
        #[arg(long, default_value_t = 200)]
        pieces: u32,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Join a relay and play one versus match with the autoplayer
    Bot {
        /// Relay address, defaults to the configured one
        #[arg(long)]
        relay: Option<String>,
        /// Name announced to the opponent
        #[arg(long)]
        name: Option<String>,
    },
}

/// Get the temp directory for session logs, creating it if needed
fn log_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("srs-versus");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Log to a per-session file; `to_stderr` also mirrors to the terminal
fn init_logging(settings: &Settings, to_stderr: bool) -> WorkerGuard {
    let session_id: u32 = rand::random();
    let dir = log_dir();
    let log_file = format!("{session_id:08x}.log");

    let file_appender = tracing_appender::rolling::never(&dir, &log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    let stderr = to_stderr.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(stderr)
        .init();

    tracing::info!(
        "srs-versus starting up, session={:08x}, log={}",
        session_id,
        dir.join(&log_file).display()
    );
    guard
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();
    let _guard = init_logging(&settings, matches!(cli.command, Command::Relay { .. }));
    write_default_settings(&settings);

    match cli.command {
        Command::Relay { addr } => {
            let addr = addr.unwrap_or_else(|| settings.network.relay_addr.clone());
            let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
            runtime.block_on(relay::serve(&addr))
        }
        Command::Simulate { seed, pieces, json } => simulate(&settings, seed, pieces, json),
        Command::Bot { relay, name } => {
            let addr = relay.unwrap_or_else(|| settings.network.relay_addr.clone());
            let name = name.unwrap_or_else(|| settings.network.player_name.clone());
            check_relay_addr(&addr)?;
            run_bot(&settings, addr, name)
        }
    }
}

/// Write the settings file on first run so there is something to edit
fn write_default_settings(settings: &Settings) {
    let Some(path) = Settings::settings_path() else {
        return;
    };
    if path.exists() {
        return;
    }
    match settings.save() {
        Ok(()) => tracing::info!("wrote default settings to {}", path.display()),
        Err(e) => tracing::warn!("could not write default settings: {:#}", e),
    }
}

fn new_engine(settings: &Settings, seed: u64) -> Engine {
    Engine::new(seed)
        .with_timing(settings.timing.lock_delay(), settings.timing.are())
        .with_clear_delay(settings.timing.clear_delay())
}

fn simulate(settings: &Settings, seed: u64, pieces: u32, json: bool) -> Result<()> {
    let mut engine = new_engine(settings, seed);
    engine.start();

    let mut placed = 0;
    let mut game_over = None;
    while placed < pieces && engine.is_running() {
        if let Some(placement) = autoplay::best_placement(&engine) {
            autoplay::apply(&mut engine, placement);
            placed += 1;
        }
        engine.update(SIMULATE_STEP);
        for event in engine.drain_events() {
            if let EngineEvent::GameOver(reason) = event {
                game_over = Some(reason);
            }
        }
    }

    let stats = engine.stats();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("failed to serialize statistics")?
        );
        return Ok(());
    }

    println!("Pieces:  {placed}");
    println!("Score:   {}", stats.score);
    println!("Level:   {} ({} to next)", stats.level, stats.goal);
    println!("Lines:   {}", stats.lines);
    println!("Time:    {}", stats.time);
    println!("Tetris:  {} | T-Spin: {} | Max combo: {}", stats.tetrises, stats.tspins, stats.combos);
    println!("TPM:     {} | LPM: {}", stats.tpm, stats.lpm);
    if let Some(reason) = game_over {
        println!("Game over: {reason}");
    }
    Ok(())
}

fn run_bot(settings: &Settings, addr: String, name: String) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let mut session = VersusSession::connect(runtime.handle(), addr, name);
    let sync_interval = settings.timing.state_sync();

    let mut engine: Option<Engine> = None;
    let mut last_tick = Instant::now();
    let mut last_move = Instant::now();
    let mut last_sync = Instant::now();

    let outcome = 'game: loop {
        std::thread::sleep(TICK);
        let now = Instant::now();
        let dt = now - last_tick;
        last_tick = now;

        for event in session.poll_events() {
            match event {
                NetEvent::Waiting => println!("Waiting for an opponent..."),
                NetEvent::Matched {
                    opponent_name,
                    role,
                    seed,
                } => {
                    println!("Matched with {opponent_name} as {role:?}");
                    let mut game = new_engine(settings, seed);
                    game.start();
                    engine = Some(game);
                }
                NetEvent::Garbage(count) => {
                    if let Some(game) = engine.as_mut() {
                        game.receive_garbage(count);
                    }
                }
                NetEvent::OpponentGameOver => break 'game "won",
                NetEvent::Disconnected { reason } => {
                    tracing::info!("disconnected: {}", reason);
                    println!("Disconnected: {reason}");
                    break 'game "disconnected";
                }
                NetEvent::OpponentBoard { .. } => {}
            }
        }

        if !session.is_connected() {
            break 'game "disconnected";
        }
        let Some(game) = engine.as_mut() else {
            continue;
        };

        if now - last_move >= BOT_MOVE_INTERVAL {
            if let Some(placement) = autoplay::best_placement(game) {
                autoplay::apply(game, placement);
                last_move = now;
            }
        }
        game.update(dt);

        for event in game.drain_events() {
            match event {
                EngineEvent::Attack(count) => session.send_garbage(count),
                EngineEvent::Locked(result) => {
                    if let Some(label) = result.label() {
                        tracing::info!("{} for {} points", label, result.score_added);
                    }
                }
                EngineEvent::GameOver(reason) => {
                    session.send_state(game.board(), game.score().score(), game.score().level());
                    session.send_game_over();
                    println!("Game over: {reason}");
                    break 'game "lost";
                }
                EngineEvent::Started | EngineEvent::LevelUp(_) => {}
            }
        }

        if now - last_sync >= sync_interval {
            session.send_state(game.board(), game.score().score(), game.score().level());
            last_sync = now;
        }
    };

    if let Some(game) = &engine {
        let stats = game.stats();
        println!(
            "Result: {outcome} | score {} | level {} | lines {} | opponent {} ({})",
            stats.score, stats.level, stats.lines, session.opponent.name, session.opponent.score
        );
    }
    session.disconnect();
    // let the network task flush before the runtime goes away
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}
