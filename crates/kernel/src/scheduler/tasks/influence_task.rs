use std::sync::{Arc, RwLock};

use coopos_core::KernelError;
use coopos_graph::Topology;
use tracing::{debug, info};

use crate::algorithms::influence::{InfluenceMap, Progress, Propagation};
use crate::persist::ThreadRecord;
use crate::scheduler::continuation::{Continuation, Step, StepContext};
use crate::scheduler::process::{Program, Supervision};
use crate::scheduler::supervisor::Supervisor;
use crate::scheduler::thread::ThreadSpec;

/// Influence map shared between the host (which seeds and reads it) and the
/// threads propagating into it.
pub type SharedInfluence = Arc<RwLock<InfluenceMap>>;

pub fn new_shared_influence(map: InfluenceMap) -> SharedInfluence {
    Arc::new(RwLock::new(map))
}

/// Drives one [`Propagation`] pass as a thread, one unit of work per step.
pub struct InfluenceTask {
    map: SharedInfluence,
    topology: Arc<dyn Topology>,
    pass: Propagation,
}

impl InfluenceTask {
    pub fn new(map: SharedInfluence, topology: Arc<dyn Topology>, pass: Propagation) -> Self {
        Self { map, topology, pass }
    }

    /// Spread whatever deltas are pending on the map.
    pub fn pending(map: SharedInfluence, topology: Arc<dyn Topology>) -> Result<Self, KernelError> {
        let pass = {
            let mut guard = map.write().map_err(|e| {
                KernelError::step_failed("influence", format!("map lock poisoned: {e}"))
            })?;
            guard.propagate_all()
        };
        Ok(Self::new(map, topology, pass))
    }

    /// Rebuild the whole field from the map's seeds.
    pub fn rebuild(map: SharedInfluence, topology: Arc<dyn Topology>) -> Result<Self, KernelError> {
        let pass = {
            let mut guard = map.write().map_err(|e| {
                KernelError::step_failed("influence", format!("map lock poisoned: {e}"))
            })?;
            guard.init()
        };
        Ok(Self::new(map, topology, pass))
    }

    pub fn pass(&self) -> &Propagation {
        &self.pass
    }
}

impl Continuation for InfluenceTask {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<Step, KernelError> {
        let mut map = self
            .map
            .write()
            .map_err(|e| KernelError::step_failed(ctx.key, format!("map lock poisoned: {e}")))?;

        match self.pass.step(&mut map, self.topology.as_ref()) {
            Progress::Pending => Ok(Step::Yield),
            Progress::Done => {
                debug!(key = ctx.key, cycle = ctx.cycle, "influence pass complete");
                Ok(Step::Done)
            }
        }
    }

    fn checkpoint(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.pass).ok()
    }
}

/// Keeps a shared influence map settled: whenever seeds change, starts a
/// thread that spreads the pending deltas.
pub struct InfluenceProgram {
    map: SharedInfluence,
    topology: Arc<dyn Topology>,
    key: String,
    /// Next pass recomputes the whole field instead of only the deltas.
    rebuild: bool,
}

impl InfluenceProgram {
    pub fn new(map: SharedInfluence, topology: Arc<dyn Topology>) -> Self {
        Self {
            map,
            topology,
            key: "propagate".to_string(),
            rebuild: false,
        }
    }

    /// Recompute the whole field from its seeds on the first pass, for a map
    /// whose data may be stale (e.g. loaded from an older snapshot).
    pub fn rebuild_on_start(mut self) -> Self {
        self.rebuild = true;
        self
    }

    pub fn map(&self) -> &SharedInfluence {
        &self.map
    }

    fn has_pending(&self) -> Result<bool, KernelError> {
        let map = self
            .map
            .read()
            .map_err(|e| KernelError::step_failed(&self.key, format!("map lock poisoned: {e}")))?;
        Ok(map.has_pending())
    }
}

impl Program for InfluenceProgram {
    fn supervise(&mut self, sup: &mut Supervisor<'_>) -> Result<Supervision, KernelError> {
        if sup.is_tracked(&self.key) || !sup.has_capacity() {
            return Ok(Supervision::Continue);
        }

        let map = Arc::clone(&self.map);
        let topology = Arc::clone(&self.topology);
        let task = if self.rebuild {
            self.rebuild = false;
            InfluenceTask::rebuild(map, topology)?
        } else if self.has_pending()? {
            InfluenceTask::pending(map, topology)?
        } else {
            return Ok(Supervision::Continue);
        };
        info!(seeds = task.pass().remaining_seeds(), "starting influence pass");
        sup.spawn_thread(ThreadSpec::new(self.key.clone(), task).label("influence"))?;
        Ok(Supervision::Continue)
    }

    fn restore_thread(&self, key: &str, record: &ThreadRecord) -> Option<ThreadSpec> {
        if key != self.key {
            return None;
        }
        let pass: Propagation = serde_json::from_value(record.checkpoint.clone()?).ok()?;
        let task = InfluenceTask::new(Arc::clone(&self.map), Arc::clone(&self.topology), pass);
        Some(ThreadSpec::new(key, task).label(record.label.clone()))
    }
}
