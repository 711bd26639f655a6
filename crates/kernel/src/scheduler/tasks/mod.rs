mod influence_task;
mod legacy_task;

pub use influence_task::{new_shared_influence, InfluenceProgram, InfluenceTask, SharedInfluence};
pub use legacy_task::LegacyProgram;
