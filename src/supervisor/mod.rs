//! Agent Supervisor — the process-wide registry of agents
//!
//! Exactly one supervisor should exist per deployment; it is constructed
//! explicitly and injected into its collaborators (the dispatcher), so tests
//! can run several independent registries side by side.

pub mod registry;

pub use registry::{CommandOutcome, OutcomeStatus, StopReport, Supervisor};
