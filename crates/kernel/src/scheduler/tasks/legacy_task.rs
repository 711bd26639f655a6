use coopos_core::KernelError;
use tracing::{debug, info};

use crate::host::CollectionSource;
use crate::persist::ThreadRecord;
use crate::scheduler::invoker::Invoker;
use crate::scheduler::process::{Program, Supervision};
use crate::scheduler::supervisor::Supervisor;
use crate::scheduler::thread::{ThreadExit, ThreadSpec};

/// Keeps one [`Invoker`] thread alive per item of a host collection.
///
/// Each supervision turn diffs the collection against the thread table and
/// starts threads for new items. Threads end on their own when their actor
/// ceases. The process exits once the collection itself is gone.
#[derive(Debug, Clone)]
pub struct LegacyProgram {
    collection: String,
    id_key: String,
    method: Option<String>,
}

impl LegacyProgram {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id_key: "id".to_string(),
            method: None,
        }
    }

    /// Item field holding the actor identifier (default `id`).
    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    /// Method invoked on each actor. Falls back to the kernel's
    /// `default_method`.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl Program for LegacyProgram {
    fn supervise(&mut self, sup: &mut Supervisor<'_>) -> Result<Supervision, KernelError> {
        let Some(items) = sup.host().collection(&self.collection) else {
            info!(collection = %self.collection, "governed collection is gone");
            return Ok(Supervision::Exit);
        };

        let method = match &self.method {
            Some(m) => m.clone(),
            None => sup.default_method().to_string(),
        };
        let report = sup.spawn_missing_threads(
            &items,
            &self.id_key,
            Some(self.collection.as_str()),
            &method,
        );
        if report.spawned > 0 || report.suspended {
            debug!(
                collection = %self.collection,
                spawned = report.spawned,
                skipped = report.skipped,
                suspended = report.suspended,
                "spawned missing threads"
            );
        }
        Ok(Supervision::Continue)
    }

    fn on_thread_exit(&mut self, exit: &ThreadExit) {
        debug!(
            collection = %self.collection,
            key = %exit.key,
            reason = %exit.reason,
            "thread exited"
        );
    }

    fn restore_thread(&self, key: &str, record: &ThreadRecord) -> Option<ThreadSpec> {
        let invoker = match record.checkpoint.clone() {
            Some(saved) if saved.is_object() => {
                let invoker: Invoker = serde_json::from_value(saved).ok()?;
                if invoker.actor() != key {
                    return None;
                }
                invoker
            }
            Some(_) => return None,
            None => Invoker::new(
                key,
                Some(self.collection.as_str()),
                self.method.as_deref().unwrap_or("run"),
            ),
        };
        Some(ThreadSpec::new(key, invoker).label(record.label.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn restores_invoker_from_checkpoint() {
        let program = LegacyProgram::new("creeps");
        let saved = Invoker::new("c7", Some("creeps"), "work");
        let record = ThreadRecord {
            tid: 3,
            label: "creeps/c7".to_string(),
            steps: 2,
            faults: 0,
            waiting_on: None,
            checkpoint: serde_json::to_value(&saved).ok(),
        };
        let spec = program.restore_thread("c7", &record).unwrap();
        assert_eq!(spec.key, "c7");
        assert_eq!(spec.label, "creeps/c7");
    }

    #[test]
    fn bad_checkpoint_drops_the_thread() {
        let program = LegacyProgram::new("creeps");
        let record = ThreadRecord {
            tid: 3,
            label: "x".to_string(),
            steps: 0,
            faults: 0,
            waiting_on: None,
            checkpoint: Some(json!(["not", "an", "invoker"])),
        };
        assert!(program.restore_thread("c7", &record).is_none());
    }

    #[test]
    fn checkpoint_for_another_actor_is_dropped() {
        let program = LegacyProgram::new("creeps");
        let record = ThreadRecord {
            tid: 3,
            label: "creeps/c7".to_string(),
            steps: 0,
            faults: 0,
            waiting_on: None,
            checkpoint: serde_json::to_value(Invoker::new("c8", Some("creeps"), "run")).ok(),
        };
        assert!(program.restore_thread("c7", &record).is_none());
    }
}
