//! Cooperative scheduler: processes own threads, threads own continuations,
//! and the [`Kernel`] resumes them one step at a time inside the host's cpu
//! budget.
//!
//! A cycle runs in three phases:
//! 1. rehydrate threads persisted by a previous boot,
//! 2. give every process program a budget-gated supervision turn,
//! 3. resume ready threads (creation order, or priority order when a
//!    priority function is installed) until the budget runs out or nobody
//!    is ready.
//!
//! Thread state is persisted to the [`StateStore`](crate::persist::StateStore)
//! at the end of every cycle.

pub mod continuation;
pub mod invoker;
pub mod metrics;
pub mod process;
pub mod runner;
pub mod supervisor;
pub mod tasks;
pub mod thread;

pub use continuation::{Continuation, Step, StepContext};
pub use invoker::Invoker;
pub use metrics::{CycleEnd, CycleReport, KernelMetrics};
pub use process::{Process, Program, Supervision};
pub use runner::{Kernel, PriorityFn, ROOT};
pub use supervisor::{SpawnReport, Supervisor};
pub use tasks::{
    new_shared_influence, InfluenceProgram, InfluenceTask, LegacyProgram, SharedInfluence,
};
pub use thread::{ExitCallback, Thread, ThreadExit, ThreadSpec, ThreadView};
