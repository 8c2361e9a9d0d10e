//! paperbroker CLI — run scripted simulations and inspect the bar cache.
//!
//! Commands:
//! - `run` — replay a TOML scenario (bar window + order schedule) and print
//!   fills, balances, and the final position
//! - `cache status` — report cached bar files, ranges, and bar counts
//!
//! A scenario file looks like:
//!
//! ```toml
//! [simulation]
//! instrument = "ACME"
//! from = "2024-01-02T10:00:00Z"
//! to = "2024-01-02T12:00:00Z"
//! interval = "min1"
//! initial_capital = 100000.0   # optional, defaults shown
//! fee_percent = 0.3
//! cache_dir = ".cache"
//!
//! [source]
//! seed = 42
//! start_price = 100.0
//! cached = true                # write bars through the CSV cache
//!
//! [[instruments]]
//! id = "ACME"
//! name = "Acme Corp"
//! lot = 10
//!
//! [[orders]]
//! before_tick = 1              # placed just before tick 1 (the first tick)
//! id = "o-1"
//! side = "buy"
//! kind = "market"
//! lots = 2
//!
//! [[orders]]
//! before_tick = 3
//! id = "o-2"
//! side = "sell"
//! kind = { limit = { limit_price = 105.0 } }
//! lots = 1
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use paperbroker_core::data::{BarSource, CachedBarSource, CsvCache, SyntheticSource};
use paperbroker_core::domain::{
    Instrument, OrderId, OrderKind, OrderSpec, OrderStatus, Side, StaticInstruments,
};
use paperbroker_core::engine::{Broker, BrokerOptions};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "paperbroker",
    about = "paperbroker CLI — deterministic broker simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a TOML scenario and print fills, balances, and positions.
    Run {
        /// Path to a TOML scenario file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached bar files, their ranges, and bar counts.
    Status {
        /// Cache directory. Defaults to ./.cache.
        #[arg(long, default_value = ".cache")]
        cache_dir: PathBuf,
    },
}

// ── Scenario config ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct Scenario {
    simulation: BrokerOptions,
    #[serde(default)]
    source: SourceConfig,
    instruments: Vec<InstrumentDef>,
    #[serde(default)]
    orders: Vec<ScriptedOrder>,
}

#[derive(Deserialize)]
struct SourceConfig {
    #[serde(default = "default_seed")]
    seed: u64,
    start_price: Option<f64>,
    /// Write generated bars through the CSV cache.
    #[serde(default)]
    cached: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            start_price: None,
            cached: false,
        }
    }
}

fn default_seed() -> u64 {
    42
}

#[derive(Deserialize)]
struct InstrumentDef {
    id: String,
    name: String,
    lot: u32,
}

#[derive(Deserialize)]
struct ScriptedOrder {
    /// 1-based tick the order is placed just before. `1` places it before the
    /// first tick, so it can only fill from tick 2 onward.
    before_tick: u64,
    id: String,
    side: Side,
    kind: OrderKind,
    lots: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run_scenario(&config),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => cache_status(&cache_dir),
        },
    }
}

fn run_scenario(path: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let scenario: Scenario =
        toml::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))?;

    if scenario.instruments.is_empty() {
        bail!("scenario defines no instruments");
    }
    log::info!(
        "scenario: {} instrument(s), {} scripted order(s), seed {}",
        scenario.instruments.len(),
        scenario.orders.len(),
        scenario.source.seed,
    );

    let mut synth = SyntheticSource::new(scenario.source.seed);
    if let Some(price) = scenario.source.start_price {
        synth = synth.with_start_price(price);
    }
    let source: Box<dyn BarSource> = if scenario.source.cached {
        Box::new(CachedBarSource::new(
            scenario.simulation.cache_dir.clone(),
            synth,
        ))
    } else {
        Box::new(synth)
    };
    let resolver = StaticInstruments::new(
        scenario
            .instruments
            .iter()
            .map(|d| Instrument::new(&d.id, &d.name, d.lot)),
    );

    let mut broker = Broker::new(source, Box::new(resolver));
    broker.configure(scenario.simulation.clone())?;
    println!(
        "simulating {} over {} .. {} ({})",
        scenario.simulation.instrument,
        scenario.simulation.from,
        scenario.simulation.to,
        scenario.simulation.interval,
    );

    let mut tick_index: u64 = 0;
    let mut reported: std::collections::HashSet<String> = std::collections::HashSet::new();
    loop {
        for scripted in scenario
            .orders
            .iter()
            .filter(|o| o.before_tick == tick_index + 1)
        {
            let order = broker.place_order(OrderSpec {
                order_id: OrderId::new(&scripted.id),
                instrument: scenario.simulation.instrument.clone(),
                side: scripted.side,
                kind: scripted.kind,
                lots: scripted.lots,
            })?;
            println!(
                "  placed {} {:?} {} lot(s) @ {:.2}",
                order.id, order.side, order.lots_requested, order.initial_price
            );
        }

        if !broker.tick()? {
            break;
        }
        tick_index += 1;

        for scripted in &scenario.orders {
            if reported.contains(&scripted.id) {
                continue;
            }
            let Ok(order) = broker.get_order(&OrderId::new(&scripted.id)) else {
                continue;
            };
            if order.status == OrderStatus::Filled {
                reported.insert(scripted.id.clone());
                println!(
                    "  tick {tick_index}: filled {} {:?} {} lot(s) @ {:.2} (fee {:.2})",
                    order.id,
                    order.side,
                    order.lots_executed,
                    order.executed_price,
                    order.executed_commission,
                );
            }
        }
    }

    print_summary(&broker, &scenario)?;
    Ok(())
}

fn print_summary(broker: &Broker, scenario: &Scenario) -> Result<()> {
    let snapshot = broker.get_balance()?;
    println!("final balances:");
    println!(
        "  cash: available {:.2}, blocked {:.2}",
        snapshot.cash.available, snapshot.cash.blocked
    );
    for (id, balance) in &snapshot.instruments {
        println!(
            "  {id}: available {}, blocked {}",
            balance.available, balance.blocked
        );
    }

    if let Some(position) = broker.get_position(&scenario.simulation.instrument) {
        println!(
            "position: {} lot(s) ({} units), avg fifo {:.2} / filo {:.2}, last {:.2}",
            position.quantity_lots,
            position.quantity,
            position.avg_price_fifo,
            position.avg_price_filo,
            position.current_price,
        );
    } else {
        println!("position: none");
    }

    let operations = broker.operations();
    let payments: f64 = operations.iter().map(|o| o.payment).sum();
    println!(
        "{} operation(s), net payments {:.2}",
        operations.len(),
        payments
    );
    for order in broker.pending_orders() {
        println!("still pending: {} ({:?})", order.id, order.kind);
    }
    Ok(())
}

fn cache_status(cache_dir: &PathBuf) -> Result<()> {
    let cache = CsvCache::new(cache_dir);
    let metas = cache.list();
    if metas.is_empty() {
        println!("cache {} is empty", cache_dir.display());
        return Ok(());
    }

    println!("cache {}: {} file(s)", cache_dir.display(), metas.len());
    for meta in metas {
        println!(
            "  {} {} — {} bar(s), {} .. {} (source: {})",
            meta.instrument,
            meta.interval,
            meta.bar_count,
            meta.start_time,
            meta.end_time,
            meta.source,
        );
    }
    Ok(())
}
