use coopos_core::KernelError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{ActorBridge, Invocation};

use super::continuation::{Continuation, Step, StepContext};

/// Calls `method` on a live actor once per step until the actor ceases.
///
/// Only [`Invocation::Ceased`] ends the thread normally; a failed invocation
/// surfaces as a step failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Invoker {
    actor: String,
    collection: Option<String>,
    method: String,
    #[serde(skip)]
    announced: bool,
}

impl Invoker {
    pub fn new(
        actor: impl Into<String>,
        collection: Option<&str>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            actor: actor.into(),
            collection: collection.map(str::to_string),
            method: method.into(),
            announced: false,
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Continuation for Invoker {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<Step, KernelError> {
        if !self.announced {
            debug!(actor = %self.actor, collection = ?self.collection, "new invoker");
            self.announced = true;
        }

        match ctx
            .host()
            .invoke(&self.actor, self.collection.as_deref(), &self.method)
        {
            Invocation::Ok => Ok(Step::Yield),
            Invocation::Ceased => {
                debug!(actor = %self.actor, "actor has ceased, exiting");
                Ok(Step::Ceased)
            }
            Invocation::Failed(reason) => Err(KernelError::step_failed(ctx.key, reason)),
        }
    }

    fn checkpoint(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}
