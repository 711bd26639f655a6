//! Cooperative execution kernel.
//!
//! Long-running work is expressed as [`Continuation`]s owned by threads,
//! threads are owned by supervised processes, and the [`Kernel`] resumes
//! them one step at a time inside a host-imposed cpu budget.

pub mod algorithms;
pub mod budget;
pub mod host;
pub mod lock;
pub mod persist;
pub mod scheduler;

pub use budget::{has_capacity, CpuBudget, CpuMeter};
pub use host::{item_id, ActorBridge, CollectionSource, Host, Invocation};
pub use lock::{LockRegistry, Spinlock};
pub use persist::{MemoryStore, ProcessRecord, StateStore, ThreadRecord};
pub use scheduler::{
    new_shared_influence, Continuation, CycleEnd, CycleReport, InfluenceProgram, InfluenceTask,
    Invoker, Kernel, KernelMetrics, LegacyProgram, Process, Program, SharedInfluence, SpawnReport,
    Step, StepContext, Supervision, Supervisor, ThreadExit, ThreadSpec, ThreadView, ROOT,
};
