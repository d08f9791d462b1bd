//! Subsystem registry and launch/landing orchestration.
//!
//! Every subsystem passes through the same staged lifecycle: registration,
//! a readiness check producing an auditable Go/No-Go verdict, a
//! dependency-gated start, and a dependency-reversed stop. The registry is
//! the process-wide table of subsystem states and dependency edges; the
//! orchestrator drives the transitions.

pub mod launch;
pub mod readiness;
pub mod registry;

pub use launch::{LaunchContext, LaunchError, LaunchReport, Orchestrator, Subsystem};
pub use readiness::LaunchReadiness;
pub use registry::{
    RegistryError, SubsystemId, SubsystemRegistry, SubsystemSnapshot, SubsystemState,
    REGISTRY_SUBSYSTEM,
};
