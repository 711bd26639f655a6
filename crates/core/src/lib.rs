pub mod config;
pub mod entity;
pub mod error;

pub use config::KernelConfig;
pub use entity::*;
pub use error::*;
