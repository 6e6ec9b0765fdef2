//! Orchestrator module - Request building and slot-aware generation runs

pub mod builder;
pub mod runner;

pub use builder::{GenerationRequest, Operation};
pub use runner::{Orchestrator, OrchestratorStats};
