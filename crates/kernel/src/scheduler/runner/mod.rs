//! The kernel: owner of the process tree and driver of execution cycles.
//!
//! Split into focused submodules:
//! - `core`: Kernel struct, constructors, and accessor methods
//! - `tree`: process and thread lifecycle (spawn, kill, reparent)
//! - `cycle`: rehydration, supervision, resumption, and persistence

mod core;
mod cycle;
mod tree;

pub use self::core::{Kernel, PriorityFn, ROOT};
