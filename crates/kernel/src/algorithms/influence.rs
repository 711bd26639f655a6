//! Decayed influence maps.
//!
//! Each seed spreads its value outward over the location graph, losing a
//! linear share per hop until it reaches zero at `max_dist` hops. The field
//! at a location is the sum of every seed's contribution along the shortest
//! hop path.
//!
//! Propagation is a [`Propagation`] cursor advanced one unit of work at a
//! time (one frontier dequeue, or one accumulation write), so a large map
//! can be spread over many budget-limited cycles. The cursor serializes, so
//! an interrupted pass survives a restart.

use std::collections::VecDeque;

use coopos_core::{KernelConfig, Location};
use coopos_graph::Topology;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_DIST: u32 = 15;
const DEFAULT_PRECISION: u32 = 5;
const DEFAULT_REPORT_PRECISION: u32 = 3;

fn default_report_precision() -> u32 {
    DEFAULT_REPORT_PRECISION
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceMap {
    /// Current seed value per location.
    influences: IndexMap<Location, f64>,
    /// Seed deltas not yet spread.
    pending: IndexMap<Location, f64>,
    /// The decayed field.
    data: IndexMap<Location, f64>,
    max_dist: u32,
    precision: u32,
    /// Places kept by [`rounded`](Self::rounded).
    #[serde(default = "default_report_precision")]
    report_precision: u32,
}

impl Default for InfluenceMap {
    fn default() -> Self {
        Self::with_horizon(DEFAULT_MAX_DIST)
    }
}

impl InfluenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_horizon(max_dist: u32) -> Self {
        Self {
            influences: IndexMap::new(),
            pending: IndexMap::new(),
            data: IndexMap::new(),
            max_dist: max_dist.max(1),
            precision: DEFAULT_PRECISION,
            report_precision: DEFAULT_REPORT_PRECISION,
        }
    }

    pub fn from_config(config: &KernelConfig) -> Self {
        let mut map = Self::with_horizon(config.influence_max_dist);
        map.precision = config.influence_precision;
        map.report_precision = config.report_precision;
        map
    }

    pub fn max_dist(&self) -> u32 {
        self.max_dist
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Replace the seed at `location` with `score`.
    pub fn set(&mut self, location: &str, score: f64) -> &mut Self {
        let seed = self.influences.entry(location.to_string()).or_insert(0.0);
        let delta = score - *seed;
        *seed = score;
        *self.pending.entry(location.to_string()).or_insert(0.0) += delta;
        self
    }

    /// Add `score` to the seed at `location`.
    pub fn add(&mut self, location: &str, score: f64) -> &mut Self {
        *self.influences.entry(location.to_string()).or_insert(0.0) += score;
        *self.pending.entry(location.to_string()).or_insert(0.0) += score;
        self
    }

    /// [`set`](Self::set), ignoring seeds too far from every existing one
    /// to matter.
    pub fn set_near(&mut self, location: &str, score: f64, topology: &dyn Topology) -> &mut Self {
        if self.is_relevant(location, topology) {
            self.set(location, score);
        }
        self
    }

    /// [`add`](Self::add), ignoring seeds too far from every existing one
    /// to matter.
    pub fn add_near(&mut self, location: &str, score: f64, topology: &dyn Topology) -> &mut Self {
        if self.is_relevant(location, topology) {
            self.add(location, score);
        }
        self
    }

    /// True while the map has no seeds, or `location` lies within
    /// `max_dist` of at least one of them.
    pub fn is_relevant(&self, location: &str, topology: &dyn Topology) -> bool {
        self.influences.is_empty()
            || self.influences.keys().any(|seed| {
                topology
                    .linear_distance(location, seed)
                    .is_some_and(|d| d <= self.max_dist)
            })
    }

    /// Rebuild the field from scratch: clear it and queue every seed.
    pub fn init(&mut self) -> Propagation {
        self.data.clear();
        self.pending = self.influences.clone();
        self.propagate_all()
    }

    /// Take every pending delta into a new propagation pass.
    pub fn propagate_all(&mut self) -> Propagation {
        Propagation::new(self.pending.drain(..))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &IndexMap<Location, f64> {
        &self.pending
    }

    pub fn influences(&self) -> &IndexMap<Location, f64> {
        &self.influences
    }

    pub fn data(&self) -> &IndexMap<Location, f64> {
        &self.data
    }

    /// Field value at `location`; 0 where nothing reached.
    pub fn value(&self, location: &str) -> f64 {
        self.data.get(location).copied().unwrap_or(0.0)
    }

    /// The field rounded to `decimals` places.
    pub fn report(&self, decimals: u32) -> IndexMap<Location, f64> {
        self.data
            .iter()
            .map(|(loc, v)| (loc.clone(), round_to(*v, decimals)))
            .collect()
    }

    /// The field rounded to the map's report precision.
    pub fn rounded(&self) -> IndexMap<Location, f64> {
        self.report(self.report_precision)
    }

    fn accumulate(&mut self, location: &str, change: f64) {
        let precision = self.precision;
        let value = self.data.entry(location.to_string()).or_insert(0.0);
        *value = round_to(*value + change, precision);
    }
}

/// Whether a propagation has work left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Phase {
    Traverse,
    /// Writing `changes[i]` into the map.
    Apply(usize),
}

/// Breadth-first walk of one seed's delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SeedWalk {
    origin: Location,
    delta: f64,
    frontier: VecDeque<Location>,
    /// Shortest hop distance discovered per location.
    seen: IndexMap<Location, u32>,
    /// Contributions in discovery order; `Phase::Apply` indexes into it.
    changes: Vec<(Location, f64)>,
    phase: Phase,
}

impl SeedWalk {
    fn new(origin: Location, delta: f64) -> Self {
        let mut seen = IndexMap::new();
        seen.insert(origin.clone(), 0);
        Self {
            frontier: VecDeque::from([origin.clone()]),
            origin,
            delta,
            seen,
            changes: Vec::new(),
            phase: Phase::Traverse,
        }
    }

    /// Perform one unit of work. `false` once the walk is finished.
    fn advance(&mut self, map: &mut InfluenceMap, topology: &dyn Topology) -> bool {
        if self.phase == Phase::Traverse {
            match self.frontier.pop_front() {
                Some(location) => {
                    self.visit(location, map.max_dist, topology);
                    return true;
                }
                None => self.phase = Phase::Apply(0),
            }
        }

        let Phase::Apply(i) = self.phase else {
            return false;
        };
        match self.changes.get(i) {
            Some((location, change)) => {
                map.accumulate(location, *change);
                self.phase = Phase::Apply(i + 1);
                true
            }
            None => false,
        }
    }

    fn visit(&mut self, location: Location, max_dist: u32, topology: &dyn Topology) {
        let dist = self.seen.get(&location).copied().unwrap_or(0);
        if dist >= max_dist {
            return;
        }
        let contribution = self.delta - self.delta * (dist as f64 / max_dist as f64);
        if contribution == 0.0 {
            return;
        }

        for exit in topology.neighbors(&location) {
            if !topology.is_available(&exit) {
                continue;
            }
            if self.seen.get(&exit).is_some_and(|known| dist + 1 >= *known) {
                continue;
            }
            self.seen.insert(exit.clone(), dist + 1);
            self.frontier.push_back(exit);
        }
        self.changes.push((location, contribution));
    }
}

/// A suspended propagation pass over an [`InfluenceMap`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Propagation {
    seeds: VecDeque<(Location, f64)>,
    walk: Option<SeedWalk>,
}

impl Propagation {
    pub fn new(seeds: impl IntoIterator<Item = (Location, f64)>) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
            walk: None,
        }
    }

    /// Seeds not yet started.
    pub fn remaining_seeds(&self) -> usize {
        self.seeds.len()
    }

    /// Location of the seed currently being spread.
    pub fn current_origin(&self) -> Option<&str> {
        self.walk.as_ref().map(|w| w.origin.as_str())
    }

    pub fn is_done(&self) -> bool {
        self.walk.is_none() && self.seeds.is_empty()
    }

    /// Advance by one unit of work.
    pub fn step(&mut self, map: &mut InfluenceMap, topology: &dyn Topology) -> Progress {
        loop {
            if let Some(walk) = self.walk.as_mut() {
                if walk.advance(map, topology) {
                    return Progress::Pending;
                }
                self.walk = None;
            }
            match self.seeds.pop_front() {
                Some((origin, delta)) => self.walk = Some(SeedWalk::new(origin, delta)),
                None => return Progress::Done,
            }
        }
    }

    /// Run to completion, returning the number of units performed.
    pub fn run_to_end(&mut self, map: &mut InfluenceMap, topology: &dyn Topology) -> usize {
        let mut steps = 0;
        while self.step(map, topology) == Progress::Pending {
            steps += 1;
        }
        steps
    }
}
