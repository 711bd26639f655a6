//! kernel-sim: drive the cooperative kernel against a simulated host.
//!
//! The host owns a collection of creeps, each of which lives for a fixed
//! number of invocations, and a cpu meter reset every cycle. A legacy
//! process keeps one invoker thread per creep while an influence process
//! spreads seeds over a room grid. Each cycle report is printed as a JSON
//! line; the settled influence field is printed as a table at the end.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};

use coopos_core::{config::load_dotenv, KernelConfig};
use coopos_graph::{coord_to_room_name, RoomGrid, Topology};
use coopos_kernel::algorithms::InfluenceMap;
use coopos_kernel::{
    new_shared_influence, ActorBridge, CollectionSource, CpuBudget, CpuMeter, InfluenceProgram,
    Invocation, Kernel, LegacyProgram, ROOT,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Simulate cooperative scheduling under a per-cycle cpu budget.
#[derive(Parser, Debug)]
#[command(name = "kernel-sim", version, about)]
struct Cli {
    /// Path to a kernel TOML config. Defaults plus `COOPOS_*` env when absent.
    #[arg(long, env = "COOPOS_CONFIG")]
    config: Option<String>,

    /// Number of cycles to run.
    #[arg(long, default_value_t = 20)]
    cycles: u64,

    /// Cpu available per cycle.
    #[arg(long, env = "COOPOS_CPU_LIMIT", default_value_t = 20.0)]
    cpu_limit: f64,

    /// Creeps alive at the start.
    #[arg(long, default_value_t = 8)]
    creeps: usize,

    /// Invocations each creep survives.
    #[arg(long, default_value_t = 12)]
    lifetime: u32,

    /// Cpu charged per actor invocation.
    #[arg(long, default_value_t = 1.0)]
    step_cost: f64,

    /// Cpu charged each time the kernel polls the budget.
    #[arg(long, default_value_t = 0.05)]
    poll_cost: f64,
}

// ── SimHost ─────────────────────────────────────────────────────────

struct SimHost {
    meter: CpuMeter,
    step_cost: f64,
    lifetime: u32,
    /// Creep id -> invocations left.
    creeps: HashMap<String, u32>,
    next_creep: usize,
}

impl SimHost {
    fn new(cli: &Cli) -> Self {
        let mut host = Self {
            meter: CpuMeter::new(cli.cpu_limit).with_poll_cost(cli.poll_cost),
            step_cost: cli.step_cost,
            lifetime: cli.lifetime,
            creeps: HashMap::new(),
            next_creep: 0,
        };
        for _ in 0..cli.creeps {
            host.birth();
        }
        host
    }

    fn birth(&mut self) {
        let id = format!("creep-{}", self.next_creep);
        self.next_creep += 1;
        // stagger lifetimes so creeps don't all die on the same tick
        let life = self.lifetime + (self.next_creep as u32 % 5);
        self.creeps.insert(id, life);
    }

    /// Start a new tick: reset the meter and replace dead creeps.
    fn tick(&mut self, population: usize) {
        self.meter.reset();
        while self.creeps.len() < population {
            self.birth();
        }
    }
}

impl CpuBudget for SimHost {
    fn used(&self) -> f64 {
        self.meter.used()
    }

    fn limit(&self) -> f64 {
        self.meter.limit()
    }
}

impl ActorBridge for SimHost {
    fn invoke(&mut self, id: &str, collection: Option<&str>, method: &str) -> Invocation {
        if collection != Some("creeps") {
            return Invocation::Failed(format!("unknown collection {collection:?}"));
        }
        let Some(life) = self.creeps.get_mut(id) else {
            return Invocation::Ceased;
        };
        if method != "run" {
            return Invocation::Failed(format!("creep has no method '{method}'"));
        }
        self.meter.charge(self.step_cost);
        *life = life.saturating_sub(1);
        if *life == 0 {
            self.creeps.remove(id);
        }
        Invocation::Ok
    }
}

impl CollectionSource for SimHost {
    fn collection(&self, name: &str) -> Option<Vec<Value>> {
        match name {
            "creeps" => {
                let mut ids: Vec<&String> = self.creeps.keys().collect();
                ids.sort();
                Some(ids.into_iter().map(|id| json!({ "id": id })).collect())
            }
            _ => None,
        }
    }
}

// ── rendering ───────────────────────────────────────────────────────

/// Render the field over `grid` as a text table, one row per grid row.
/// Values are rounded to the map's report precision.
fn render_table(map: &InfluenceMap, grid: &RoomGrid) -> String {
    let ((lx, ly), (ux, uy)) = grid.bounds();
    let values = map.rounded();
    let mut out = String::new();
    for y in ly..=uy {
        let row: Vec<String> = (lx..=ux)
            .map(|x| {
                let room = coord_to_room_name(x, y);
                if !grid.is_available(&room) {
                    return format!("{:>9}", "##");
                }
                match values.get(&room) {
                    Some(v) if *v != 0.0 => format!("{v:>9}"),
                    _ => format!("{:>9}", "--"),
                }
            })
            .collect();
        out.push_str(&row.join(""));
        out.push('\n');
    }
    out
}

fn load_config(cli: &Cli) -> anyhow::Result<KernelConfig> {
    match &cli.config {
        Some(path) => KernelConfig::from_file(path)
            .with_context(|| format!("failed to load kernel config from {path}")),
        None => KernelConfig::from_env().context("invalid kernel config in environment"),
    }
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    config.log_summary();

    let mut grid = RoomGrid::between("W9N9", "W0N0").context("invalid room grid bounds")?;
    grid.close("W5N4");
    grid.close("W5N5");
    let topology: Arc<dyn Topology> = Arc::new(grid.clone());

    let mut seeds = InfluenceMap::from_config(&config);
    seeds
        .set("W8N3", 100.0)
        .set("W7N4", 50.0)
        .set("W1N1", -100.0)
        .set("W1N8", -60.0);
    let influence = new_shared_influence(seeds);

    let mut kernel = Kernel::new(config);
    kernel
        .spawn_process(ROOT, "legacy", LegacyProgram::new("creeps"))
        .context("failed to start legacy process")?;
    kernel
        .spawn_process(
            ROOT,
            "influence",
            InfluenceProgram::new(Arc::clone(&influence), topology),
        )
        .context("failed to start influence process")?;

    let mut host = SimHost::new(&cli);
    info!(cycles = cli.cycles, cpu_limit = cli.cpu_limit, "starting simulation");

    for _ in 0..cli.cycles {
        host.tick(cli.creeps);
        let report = kernel.run_cycle(&mut host);
        println!("{}", serde_json::to_string(&report)?);
    }

    let metrics = kernel.metrics();
    println!("{}", serde_json::to_string_pretty(metrics)?);

    match influence.read() {
        Ok(map) => {
            if map.has_pending() {
                warn!("influence map still has pending deltas");
            }
            println!("{}", render_table(&map, &grid));
        }
        Err(e) => warn!(error = %e, "influence map lock poisoned"),
    }

    Ok(())
}
