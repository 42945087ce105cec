//! Command-line driver for `lob-engine` (§6, §10.4): `submit`, `cancel`,
//! `modify`, `snapshot`, `replay <log>`.
//!
//! The engine itself is a library with no process of its own, so this
//! binary supplies the missing persistence: every `submit`/`cancel`/
//! `modify` invocation first silently replays the prior commands
//! recorded under `--state-dir` to rebuild book state, then dispatches
//! the new command, appending both the command (to the command log) and
//! the events it produced (to the journal) before exiting. `replay`
//! re-dispatches a recorded command log against a fresh engine and
//! verifies the result against the journal recorded alongside it,
//! byte for byte (§8 "replay determinism").

use clap::{Parser, Subcommand, ValueEnum};
use lob_engine::clock::ManualClock;
use lob_engine::engine::{Command, Engine, EngineConfig};
use lob_engine::event::{Event, VecEventSink};
use lob_engine::journal::Journal;
use lob_engine::order::{OrderId, OrderKind, Owner, Side};
use lob_engine::replay::verify_replay;
use lob_engine::symbol_book::{SubmitCommand, SymbolBookConfig};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

const USAGE_ERROR: u8 = 2;
const REPLAY_DIVERGENCE: u8 = 3;

#[derive(Parser)]
#[command(name = "lob", about = "Command-line driver for the lob-engine matching engine")]
struct Cli {
    /// Directory holding this run's command log and event journal.
    #[arg(long, global = true, default_value = "./lob-state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new order.
    Submit {
        /// Instrument symbol.
        symbol: String,
        /// Client-assigned order id, unique per symbol.
        order_id: u64,
        /// buy or sell.
        #[arg(value_enum)]
        side: SideArg,
        /// Order kind.
        #[arg(value_enum, long, default_value = "limit")]
        kind: KindArg,
        /// Limit/trigger-resting price, in ticks. Required except for `market`.
        #[arg(long)]
        price: Option<i64>,
        /// Trigger price, for `stop-loss`/`stop-limit`.
        #[arg(long)]
        stop_price: Option<i64>,
        /// Total quantity.
        #[arg(long)]
        quantity: u64,
        /// Visible portion, for `iceberg`. Defaults to `quantity`.
        #[arg(long)]
        displayed_quantity: Option<u64>,
        /// Owner id, for self-trade prevention. Omit for anonymous.
        #[arg(long)]
        owner: Option<u64>,
    },
    /// Cancel a live order.
    Cancel {
        /// Instrument symbol.
        symbol: String,
        /// Order id to cancel.
        order_id: u64,
    },
    /// Modify a resting order's price and/or quantity.
    Modify {
        /// Instrument symbol.
        symbol: String,
        /// Order id to modify.
        order_id: u64,
        /// Requested new price, in ticks.
        #[arg(long)]
        price: i64,
        /// Requested new quantity.
        #[arg(long)]
        quantity: u64,
    },
    /// Capture and print a book snapshot.
    Snapshot {
        /// Instrument symbol.
        symbol: String,
        /// Include per-order detail, not just aggregated depth.
        #[arg(long)]
        orders: bool,
    },
    /// Replay a recorded command log and verify it against its journal.
    Replay {
        /// Path to the command log (JSON Lines of recorded commands).
        log: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Limit,
    Market,
    Ioc,
    Fok,
    Iceberg,
    StopLoss,
    StopLimit,
}

impl From<KindArg> for OrderKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Limit => OrderKind::Limit,
            KindArg::Market => OrderKind::Market,
            KindArg::Ioc => OrderKind::Ioc,
            KindArg::Fok => OrderKind::Fok,
            KindArg::Iceberg => OrderKind::Iceberg,
            KindArg::StopLoss => OrderKind::StopLoss,
            KindArg::StopLimit => OrderKind::StopLimit,
        }
    }
}

/// One line of the persisted command log: the command plus the clock
/// reading it was dispatched under, so replay can reproduce identical
/// event timestamps (§6 "replaying the log... reproduces the same
/// events byte-for-byte").
#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct CommandRecord {
    ts: u64,
    command: Command,
}

fn commands_path(state_dir: &Path) -> PathBuf {
    state_dir.join("commands.jsonl")
}

fn events_path(state_dir: &Path) -> PathBuf {
    state_dir.join("events.journal")
}

fn read_command_log(path: &Path) -> Result<Vec<CommandRecord>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    BufReader::new(file)
        .lines()
        .filter(|line| line.as_ref().map(|l| !l.trim().is_empty()).unwrap_or(true))
        .map(|line| {
            let line = line.map_err(|e| format!("reading {}: {e}", path.display()))?;
            serde_json::from_str(&line).map_err(|e| format!("parsing {}: {e}", path.display()))
        })
        .collect()
}

fn append_command_record(path: &Path, record: &CommandRecord) -> Result<(), String> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("opening {}: {e}", path.display()))?;
    let line = serde_json::to_string(record).map_err(|e| e.to_string())?;
    writeln!(file, "{line}").map_err(|e| format!("writing {}: {e}", path.display()))
}

/// Builds a fresh engine, replays `history` into it under `sink` (a
/// throwaway probe so those events never re-enter the journal), and
/// registers every symbol `history` (plus `extra_symbol`) touched so far
/// with the default configuration.
fn rebuild_engine(
    history: &[CommandRecord],
    extra_symbol: Option<&str>,
    clock: Arc<ManualClock>,
    sink: Arc<dyn lob_engine::event::EventSink>,
) -> Result<Engine, String> {
    let engine = Engine::new(clock.clone(), sink, EngineConfig::default());
    let mut symbols: Vec<&str> = history.iter().map(|r| r.command.symbol()).collect();
    if let Some(symbol) = extra_symbol {
        symbols.push(symbol);
    }
    for symbol in symbols {
        if engine.book(symbol).is_none() {
            engine.add_symbol(symbol, SymbolBookConfig::default());
        }
    }
    for record in history {
        clock.set(record.ts);
        engine
            .dispatch(record.command.clone())
            .map_err(|e| format!("replaying prior history: {e}"))?;
    }
    Ok(engine)
}

fn print_events(events: &[Event]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("failed to encode event {event:?}: {e}"),
        }
    }
}

/// Runs one new `Command` against the persisted state under `state_dir`:
/// rebuild, dispatch, persist the command and its events, print the events.
fn run_mutating_command(state_dir: &Path, command: Command) -> Result<Vec<Event>, String> {
    fs::create_dir_all(state_dir).map_err(|e| format!("creating {}: {e}", state_dir.display()))?;
    let commands_log = commands_path(state_dir);
    let history = read_command_log(&commands_log)?;

    let clock = Arc::new(ManualClock::new(0));
    let probe = Arc::new(VecEventSink::new());
    let engine = rebuild_engine(&history, Some(command.symbol()), clock.clone(), probe.clone())?;
    let _ = probe.drain(); // discard the replayed-history events; only the new command's events are journaled

    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    clock.set(ts);
    engine.dispatch(command.clone()).map_err(|e| format!("dispatch failed: {e}"))?;
    let new_events = probe.drain();

    let journal = Journal::open(events_path(state_dir)).map_err(|e| format!("opening journal: {e}"))?;
    for event in &new_events {
        journal.append(event).map_err(|e| format!("appending to journal: {e}"))?;
    }
    append_command_record(&commands_log, &CommandRecord { ts, command })?;

    Ok(new_events)
}

fn run() -> Result<ExitCode, String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            symbol,
            order_id,
            side,
            kind,
            price,
            stop_price,
            quantity,
            displayed_quantity,
            owner,
        } => {
            let cmd = SubmitCommand {
                order_id: OrderId(order_id),
                side: side.into(),
                kind: kind.into(),
                price,
                stop_price,
                quantity,
                displayed_quantity,
                owner: owner.map(Owner).unwrap_or(Owner::ANONYMOUS),
            };
            info!("cli: submit order {} on {}", order_id, symbol);
            let events = run_mutating_command(&cli.state_dir, Command::Submit { symbol, cmd })?;
            print_events(&events);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cancel { symbol, order_id } => {
            info!("cli: cancel order {} on {}", order_id, symbol);
            let events = run_mutating_command(
                &cli.state_dir,
                Command::Cancel {
                    symbol,
                    order_id: OrderId(order_id),
                },
            )?;
            print_events(&events);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Modify {
            symbol,
            order_id,
            price,
            quantity,
        } => {
            info!("cli: modify order {} on {}", order_id, symbol);
            let events = run_mutating_command(
                &cli.state_dir,
                Command::Modify {
                    symbol,
                    order_id: OrderId(order_id),
                    new_price: price,
                    new_quantity: quantity,
                },
            )?;
            print_events(&events);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Snapshot { symbol, orders } => {
            let commands_log = commands_path(&cli.state_dir);
            let history = read_command_log(&commands_log)?;
            let clock = Arc::new(ManualClock::new(0));
            let sink = Arc::new(VecEventSink::new());
            let engine = rebuild_engine(&history, Some(&symbol), clock, sink)?;
            let snapshot = engine
                .snapshot(&symbol, orders)
                .ok_or_else(|| format!("unknown symbol {symbol}"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).map_err(|e| e.to_string())?
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Replay { log } => {
            let history = read_command_log(&log)?;
            if history.is_empty() {
                return Err(format!("no commands recorded at {}", log.display()));
            }
            let events_log = log.parent().unwrap_or_else(|| Path::new(".")).join("events.journal");
            let original = Journal::open(&events_log)
                .map_err(|e| format!("opening {}: {e}", events_log.display()))?
                .read_all()
                .map_err(|e| format!("reading {}: {e}", events_log.display()))?;

            let clock = Arc::new(ManualClock::new(0));
            let sink = Arc::new(VecEventSink::new());
            let engine = rebuild_engine(&[], None, clock.clone(), sink.clone())?;
            for record in &history {
                if engine.book(record.command.symbol()).is_none() {
                    engine.add_symbol(record.command.symbol(), SymbolBookConfig::default());
                }
                clock.set(record.ts);
                engine
                    .dispatch(record.command.clone())
                    .map_err(|e| format!("replaying {}: {e}", log.display()))?;
            }
            let replayed = sink.drain();

            match verify_replay(&original, &replayed) {
                Ok(()) => {
                    println!("replay OK: {} events verified byte-identical", original.len());
                    Ok(ExitCode::SUCCESS)
                }
                Err(divergence) => {
                    eprintln!("{divergence}");
                    Ok(ExitCode::from(REPLAY_DIVERGENCE))
                }
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(code) => code,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(USAGE_ERROR)
        }
    }
}
