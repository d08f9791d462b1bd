//! Process-wide subsystem state table.
//!
//! Entries are created at registration, mutated in place under a single
//! lock, and never deleted during normal operation. The registry entry for
//! the registry itself is bootstrapped specially: it is pre-registered and
//! forced straight to `Running`, because every other subsystem's dependency
//! tracking requires the table to already exist.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

/// Name under which the registry registers itself.
pub const REGISTRY_SUBSYSTEM: &str = "registry";

/// Registry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown subsystem: {0}")]
    UnknownSubsystem(String),
}

/// Lifecycle state of a registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl SubsystemState {
    pub fn as_str(self) -> &'static str {
        match self {
            SubsystemState::Stopped => "stopped",
            SubsystemState::Starting => "starting",
            SubsystemState::Running => "running",
            SubsystemState::Stopping => "stopping",
            SubsystemState::Error => "error",
        }
    }
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle for one registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsystemId(usize);

#[derive(Debug, Clone)]
struct SubsystemEntry {
    name: String,
    state: SubsystemState,
    dependencies: Vec<String>,
    state_changed: DateTime<Utc>,
}

/// Read-only view of one entry, for status reporting.
#[derive(Debug, Clone)]
pub struct SubsystemSnapshot {
    pub name: String,
    pub state: SubsystemState,
    pub dependencies: Vec<String>,
    pub state_changed: DateTime<Utc>,
}

/// The shared subsystem table. All mutation is serialized by one mutex;
/// readiness checks run lock-free and only the final state writes contend.
pub struct SubsystemRegistry {
    inner: Mutex<Vec<SubsystemEntry>>,
}

impl Default for SubsystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubsystemRegistry {
    /// Create the registry with its own entry pre-registered and running.
    pub fn new() -> Self {
        let registry = SubsystemRegistry {
            inner: Mutex::new(Vec::new()),
        };
        let id = registry.register(REGISTRY_SUBSYSTEM);
        registry.update_state(id, SubsystemState::Running);
        registry
    }

    /// Register a subsystem, or return the existing id for its name.
    pub fn register(&self, name: &str) -> SubsystemId {
        let mut entries = self.lock();
        if let Some(index) = entries.iter().position(|e| e.name == name) {
            return SubsystemId(index);
        }
        entries.push(SubsystemEntry {
            name: name.to_string(),
            state: SubsystemState::Stopped,
            dependencies: Vec::new(),
            state_changed: Utc::now(),
        });
        SubsystemId(entries.len() - 1)
    }

    /// Record a dependency edge. The dependency must already be registered.
    pub fn add_dependency(&self, id: SubsystemId, dependency: &str) -> Result<(), RegistryError> {
        let mut entries = self.lock();
        if !entries.iter().any(|e| e.name == dependency) {
            return Err(RegistryError::UnknownSubsystem(dependency.to_string()));
        }
        let entry = &mut entries[id.0];
        if !entry.dependencies.iter().any(|d| d == dependency) {
            entry.dependencies.push(dependency.to_string());
        }
        Ok(())
    }

    pub fn update_state(&self, id: SubsystemId, state: SubsystemState) {
        let mut entries = self.lock();
        let entry = &mut entries[id.0];
        entry.state = state;
        entry.state_changed = Utc::now();
    }

    pub fn state_of(&self, id: SubsystemId) -> SubsystemState {
        self.lock()[id.0].state
    }

    pub fn id_by_name(&self, name: &str) -> Option<SubsystemId> {
        self.lock()
            .iter()
            .position(|e| e.name == name)
            .map(SubsystemId)
    }

    pub fn name_of(&self, id: SubsystemId) -> String {
        self.lock()[id.0].name.clone()
    }

    /// Whether every dependency of `id` is in `Running` state.
    ///
    /// The registry subsystem is exempt: once registered it always counts
    /// as satisfied, since it never passes through the normal state
    /// machine.
    pub fn dependencies_satisfied(&self, id: SubsystemId) -> bool {
        let entries = self.lock();
        entries[id.0].dependencies.iter().all(|dep| {
            if dep == REGISTRY_SUBSYSTEM {
                return true;
            }
            entries
                .iter()
                .find(|e| &e.name == dep)
                .map(|e| e.state == SubsystemState::Running)
                .unwrap_or(false)
        })
    }

    /// Whether every subsystem that depends on `name` has stopped.
    ///
    /// Gates the landing path: a subsystem may only stop once nothing
    /// running still depends on it.
    pub fn dependents_stopped(&self, name: &str) -> bool {
        let entries = self.lock();
        entries
            .iter()
            .filter(|e| e.dependencies.iter().any(|d| d == name))
            .all(|e| {
                matches!(
                    e.state,
                    SubsystemState::Stopped | SubsystemState::Error
                )
            })
    }

    pub fn snapshot(&self) -> Vec<SubsystemSnapshot> {
        self.lock()
            .iter()
            .map(|e| SubsystemSnapshot {
                name: e.name.clone(),
                state: e.state,
                dependencies: e.dependencies.clone(),
                state_changed: e.state_changed,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SubsystemEntry>> {
        self.inner.lock().expect("subsystem registry lock poisoned")
    }
}
