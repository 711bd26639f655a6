use thiserror::Error;

use crate::entity::{Pid, ThreadKey};

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("process '{name}' already exists under {parent}")]
    DuplicateProcess { parent: Pid, name: String },

    #[error("process not found: {0}")]
    ProcessNotFound(Pid),

    #[error("reparenting {pid} under {parent} would create a supervision cycle")]
    SupervisionCycle { pid: Pid, parent: Pid },

    #[error("the root process cannot be killed or reparented")]
    RootProcess,

    #[error("thread already exists for key '{0}'")]
    DuplicateThread(ThreadKey),

    #[error("thread not found for key '{key}' in {pid}")]
    ThreadNotFound { pid: Pid, key: ThreadKey },

    #[error("step failed for '{key}': {reason}")]
    StepFailed { key: ThreadKey, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

impl KernelError {
    /// Shorthand for a [`KernelError::StepFailed`] raised by a continuation.
    pub fn step_failed(key: impl Into<ThreadKey>, reason: impl Into<String>) -> Self {
        KernelError::StepFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
