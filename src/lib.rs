pub mod cli;
pub mod commands;
pub mod error;
pub mod loader;
pub mod middleware;
pub mod server;
pub mod spec;
pub mod telemetry;
pub mod validation;

pub use error::{Result, WardenError};
pub use spec::{EngineOptions, SpecRegistry, Specification, Version};
pub use validation::{Finding, Findings, ValidationReport};
