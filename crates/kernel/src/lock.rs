//! Cooperative mutual exclusion.
//!
//! A lock is a named flag owned by at most one thread. Waiting never blocks
//! the scheduler: a thread that cannot acquire a lock reports
//! [`Step::Blocked`] and is retried on a later pass or cycle.

use std::collections::HashMap;

use coopos_core::{KernelError, Tid};
use tracing::debug;

use crate::scheduler::{Continuation, Step, StepContext};

/// Table of held locks, owned by the kernel.
///
/// Entries are created on first acquisition and vanish on release.
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: HashMap<String, Tid>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take `name` for `tid`. Re-acquiring a lock already held by `tid`
    /// succeeds.
    pub fn try_acquire(&mut self, name: &str, tid: Tid) -> bool {
        match self.held.get(name) {
            Some(holder) => *holder == tid,
            None => {
                self.held.insert(name.to_string(), tid);
                true
            }
        }
    }

    /// Release `name` if `tid` holds it.
    pub fn release(&mut self, name: &str, tid: Tid) -> bool {
        if self.held.get(name) == Some(&tid) {
            self.held.remove(name);
            true
        } else {
            false
        }
    }

    /// Drop every lock `tid` holds, returning their names.
    pub fn release_all(&mut self, tid: Tid) -> Vec<String> {
        let mut names: Vec<String> = self
            .held
            .iter()
            .filter(|(_, holder)| **holder == tid)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        for name in &names {
            self.held.remove(name);
        }
        names
    }

    pub fn holder(&self, name: &str) -> Option<Tid> {
        self.held.get(name).copied()
    }

    /// Whether `name` is held by a thread other than `tid`.
    pub fn is_contended(&self, name: &str, tid: Tid) -> bool {
        matches!(self.held.get(name), Some(holder) if *holder != tid)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Runs `inner` as a critical section guarded by the lock `name`.
///
/// The lock is taken before the first step of the body and held across its
/// yields. It is released as soon as the body finishes, ceases or fails.
pub struct Spinlock<C> {
    name: String,
    inner: C,
    held: bool,
}

impl<C: Continuation> Spinlock<C> {
    pub fn new(name: impl Into<String>, inner: C) -> Self {
        Self {
            name: name.into(),
            inner,
            held: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    fn unlock(&mut self, ctx: &mut StepContext<'_>) {
        if self.held {
            let tid = ctx.tid;
            ctx.locks().release(&self.name, tid);
            self.held = false;
            debug!(lock = %self.name, %tid, "released");
        }
    }
}

impl<C: Continuation> Continuation for Spinlock<C> {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<Step, KernelError> {
        if !self.held {
            let tid = ctx.tid;
            if !ctx.locks().try_acquire(&self.name, tid) {
                return Ok(Step::Blocked(self.name.clone()));
            }
            self.held = true;
            debug!(lock = %self.name, %tid, "acquired");
        }

        match self.inner.step(ctx) {
            Ok(Step::Yield) => Ok(Step::Yield),
            Ok(Step::Blocked(other)) => Ok(Step::Blocked(other)),
            Ok(done) => {
                self.unlock(ctx);
                Ok(done)
            }
            Err(e) => {
                self.unlock(ctx);
                Err(e)
            }
        }
    }

    fn checkpoint(&self) -> Option<serde_json::Value> {
        self.inner.checkpoint()
    }
}
