//! End-to-end scenarios: programs driven through many budgeted cycles
//! against a mock host, including a restart from persisted state.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};

use coopos_core::{ExitReason, KernelConfig};
use coopos_graph::{LocationGraph, Topology};
use coopos_kernel::algorithms::InfluenceMap;
use coopos_kernel::{
    new_shared_influence, ActorBridge, CollectionSource, CpuBudget, CpuMeter, CycleEnd,
    InfluenceProgram, Invocation, Kernel, LegacyProgram, ROOT,
};

/// Host whose only collection is a set of creep ids. Every poll of the
/// budget costs one unit, so a small limit spreads work over many cycles.
struct ScenarioHost {
    meter: CpuMeter,
    creeps: Vec<String>,
    dead: HashSet<String>,
}

impl ScenarioHost {
    fn new(limit: f64, creeps: &[&str]) -> Self {
        Self {
            meter: CpuMeter::new(limit).with_poll_cost(1.0),
            creeps: creeps.iter().map(|c| c.to_string()).collect(),
            dead: HashSet::new(),
        }
    }

    fn kill(&mut self, id: &str) {
        self.creeps.retain(|c| c != id);
        self.dead.insert(id.to_string());
    }
}

impl CpuBudget for ScenarioHost {
    fn used(&self) -> f64 {
        self.meter.used()
    }

    fn limit(&self) -> f64 {
        self.meter.limit()
    }
}

impl ActorBridge for ScenarioHost {
    fn invoke(&mut self, id: &str, _collection: Option<&str>, _method: &str) -> Invocation {
        if self.dead.contains(id) {
            Invocation::Ceased
        } else {
            Invocation::Ok
        }
    }
}

impl CollectionSource for ScenarioHost {
    fn collection(&self, name: &str) -> Option<Vec<Value>> {
        (name == "creeps").then(|| self.creeps.iter().map(|id| json!({ "id": id })).collect())
    }
}

/// a - b - c - d - e - f - g
fn line() -> LocationGraph {
    LocationGraph::from_edges([
        ("a", "b"),
        ("b", "c"),
        ("c", "d"),
        ("d", "e"),
        ("e", "f"),
        ("f", "g"),
    ])
}

fn opposite_seeds() -> InfluenceMap {
    let mut map = InfluenceMap::with_horizon(3);
    map.set("a", 100.0).set("g", -100.0);
    map
}

fn direct_run(graph: &LocationGraph) -> InfluenceMap {
    let mut map = opposite_seeds();
    let mut pass = map.propagate_all();
    pass.run_to_end(&mut map, graph);
    map
}

#[test]
fn influence_settles_across_budgeted_cycles() {
    let graph = line();
    let topology: Arc<dyn Topology> = Arc::new(graph.clone());
    let influence = new_shared_influence(opposite_seeds());

    let mut kernel = Kernel::new(KernelConfig::default());
    kernel
        .spawn_process(ROOT, "influence", InfluenceProgram::new(Arc::clone(&influence), topology))
        .unwrap();
    let mut host = ScenarioHost::new(6.0, &[]);

    let mut cycles = 0;
    loop {
        host.meter.reset();
        let report = kernel.run_cycle(&mut host);
        assert_eq!(report.end, CycleEnd::Idle);
        cycles += 1;
        if kernel.thread_count() == 0 && !influence.read().unwrap().has_pending() {
            break;
        }
        assert!(cycles < 500, "propagation never finished");
    }

    // one unit of work per cycle, so the pass spans many of them
    assert!(cycles > 5);
    assert_eq!(kernel.metrics().exits[&ExitReason::Completed], 1);

    let settled = influence.read().unwrap();
    let expected = direct_run(&graph);
    assert_eq!(settled.data(), expected.data());
    assert_eq!(settled.value("b"), 66.66667);
    assert_eq!(settled.value("d"), 0.0);
    assert_eq!(settled.report(3)["f"], -66.667);
}

#[test]
fn removed_item_ceases_its_thread() {
    let mut kernel = Kernel::new(KernelConfig::default());
    let legacy = kernel
        .spawn_process(ROOT, "legacy", LegacyProgram::new("creeps"))
        .unwrap();
    let mut host = ScenarioHost::new(100.0, &["a", "b", "c"]);

    let first = kernel.run_cycle(&mut host);
    assert_eq!(first.spawned, 3);
    assert_eq!(kernel.threads(legacy).len(), 3);

    host.meter.reset();
    host.kill("b");
    let second = kernel.run_cycle(&mut host);
    assert_eq!(second.exits_for(ExitReason::Ceased), 1);
    assert_eq!(second.spawned, 0);

    let keys: Vec<String> = kernel.threads(legacy).into_iter().map(|t| t.key).collect();
    assert_eq!(keys, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(kernel.metrics().exits[&ExitReason::Ceased], 1);
}

#[test]
fn interrupted_propagation_survives_a_restart() {
    let graph = line();
    let topology: Arc<dyn Topology> = Arc::new(graph.clone());
    let influence = new_shared_influence(opposite_seeds());

    let mut kernel = Kernel::new(KernelConfig::default());
    kernel
        .spawn_process(ROOT, "legacy", LegacyProgram::new("creeps"))
        .unwrap();
    kernel
        .spawn_process(
            ROOT,
            "influence",
            InfluenceProgram::new(Arc::clone(&influence), Arc::clone(&topology)),
        )
        .unwrap();
    let mut host = ScenarioHost::new(8.0, &["x", "y"]);

    // run until the pass is underway but not finished
    let mut cycles = 0;
    while kernel.thread(kernel.find_child(ROOT, "influence").unwrap(), "propagate").is_none() {
        host.meter.reset();
        kernel.run_cycle(&mut host);
        cycles += 1;
        assert!(cycles < 50, "influence pass never started");
    }
    host.meter.reset();
    kernel.run_cycle(&mut host);

    // the host keeps the map across restarts as plain serialized data
    let saved_map = serde_json::to_value(&*influence.read().unwrap()).unwrap();
    let store = kernel.into_store();

    let restored_map: InfluenceMap = serde_json::from_value(saved_map).unwrap();
    let influence = new_shared_influence(restored_map);
    let mut kernel = Kernel::with_store(KernelConfig::default(), store);
    let legacy = kernel
        .spawn_process(ROOT, "legacy", LegacyProgram::new("creeps"))
        .unwrap();
    let prop = kernel
        .spawn_process(ROOT, "influence", InfluenceProgram::new(Arc::clone(&influence), topology))
        .unwrap();

    host.meter.reset();
    let report = kernel.run_cycle(&mut host);
    assert!(report.restored >= 3);
    assert_eq!(kernel.threads(legacy).len(), 2);

    let mut cycles = 0;
    while kernel.thread(prop, "propagate").is_some() {
        host.meter.reset();
        kernel.run_cycle(&mut host);
        cycles += 1;
        assert!(cycles < 500, "restored pass never finished");
    }

    let settled = influence.read().unwrap();
    let expected = direct_run(&graph);
    for (location, value) in expected.data() {
        assert!(
            (settled.value(location) - value).abs() < 1e-9,
            "{location}: {} != {value}",
            settled.value(location)
        );
    }
}

#[test]
fn rebuild_replaces_a_stale_field() {
    let graph = line();
    let topology: Arc<dyn Topology> = Arc::new(graph.clone());

    // a snapshot whose field no longer matches its seeds
    let mut snapshot = serde_json::to_value(direct_run(&graph)).unwrap();
    snapshot["data"]["d"] = json!(42.0);
    snapshot["data"]["zz"] = json!(-7.0);
    let stale: InfluenceMap = serde_json::from_value(snapshot).unwrap();
    assert!(!stale.has_pending());
    let influence = new_shared_influence(stale);

    let mut kernel = Kernel::new(KernelConfig::default());
    let prop = kernel
        .spawn_process(
            ROOT,
            "influence",
            InfluenceProgram::new(Arc::clone(&influence), topology).rebuild_on_start(),
        )
        .unwrap();
    let mut host = ScenarioHost::new(100.0, &[]);

    host.meter.reset();
    kernel.run_cycle(&mut host);
    assert!(kernel.thread(prop, "propagate").is_some());

    let mut cycles = 1;
    while kernel.thread(prop, "propagate").is_some() {
        host.meter.reset();
        kernel.run_cycle(&mut host);
        cycles += 1;
        assert!(cycles < 500, "rebuild never finished");
    }

    // only one rebuild; nothing is pending afterwards
    host.meter.reset();
    kernel.run_cycle(&mut host);
    assert!(kernel.thread(prop, "propagate").is_none());

    let settled = influence.read().unwrap();
    assert_eq!(settled.data(), direct_run(&graph).data());
    assert_eq!(settled.value("zz"), 0.0);
}
