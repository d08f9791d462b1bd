//! Launch and landing orchestration.
//!
//! Startup runs in phases: a readiness sweep over every registered
//! subsystem, a plan summary, then a dependency-gated start pass in
//! registration order. A No-Go verdict is terminal for that launch attempt;
//! there is no automatic retry. Landing reverses the order, and a subsystem
//! only stops once everything depending on it has stopped.

use crate::readiness::LaunchReadiness;
use crate::registry::{SubsystemId, SubsystemRegistry, SubsystemState};
use conduit_protocol::AppConfig;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors surfaced by a subsystem start.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Subsystem {subsystem} failed to start: {reason}")]
    StartFailed { subsystem: String, reason: String },

    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),
}

impl LaunchError {
    pub fn start_failed(subsystem: impl Into<String>, reason: impl Into<String>) -> Self {
        LaunchError::StartFailed {
            subsystem: subsystem.into(),
            reason: reason.into(),
        }
    }
}

/// Shared state handed to every readiness check and start/stop call.
#[derive(Clone)]
pub struct LaunchContext {
    pub config: Arc<AppConfig>,
    pub registry: Arc<SubsystemRegistry>,
}

/// One managed subsystem.
///
/// `check_readiness` must be pure with respect to the registry (checks may
/// run concurrently); `start` and `stop` are driven strictly by the
/// orchestrator thread.
pub trait Subsystem: Send {
    fn name(&self) -> &'static str;

    /// Names of subsystems that must be running before this one starts.
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness;

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError>;

    fn stop(&mut self, ctx: &LaunchContext);
}

/// Outcome of a launch pass.
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub checked: usize,
    pub go: usize,
    pub no_go: usize,
    pub started: usize,
    pub failed: usize,
}

impl LaunchReport {
    pub fn all_started(&self) -> bool {
        self.failed == 0 && self.started == self.go
    }
}

struct ManagedSubsystem {
    id: SubsystemId,
    inner: Box<dyn Subsystem>,
    running: bool,
}

/// Drives every registered subsystem through launch and landing.
pub struct Orchestrator {
    registry: Arc<SubsystemRegistry>,
    subsystems: Vec<ManagedSubsystem>,
}

impl Orchestrator {
    pub fn new(registry: Arc<SubsystemRegistry>) -> Self {
        Orchestrator {
            registry,
            subsystems: Vec::new(),
        }
    }

    /// Register a subsystem and record its dependency edges.
    ///
    /// Registration order is launch order; callers add dependencies before
    /// their dependents.
    pub fn add(&mut self, subsystem: Box<dyn Subsystem>) -> Result<(), LaunchError> {
        let id = self.registry.register(subsystem.name());
        for dependency in subsystem.dependencies() {
            self.registry.register(dependency);
            self.registry.add_dependency(id, dependency)?;
        }
        self.subsystems.push(ManagedSubsystem {
            id,
            inner: subsystem,
            running: false,
        });
        Ok(())
    }

    /// Phase 1-3: readiness sweep, plan summary, dependency-gated start.
    pub fn launch_all(&mut self, ctx: &LaunchContext) -> LaunchReport {
        let mut report = LaunchReport::default();
        let mut verdicts = Vec::with_capacity(self.subsystems.len());

        for managed in &self.subsystems {
            let readiness = managed.inner.check_readiness(ctx).decide();
            info!(subsystem = %readiness.subsystem, ready = readiness.ready, "Readiness check");
            for line in &readiness.messages {
                info!("{}", line);
            }
            report.checked += 1;
            if readiness.ready {
                report.go += 1;
            } else {
                report.no_go += 1;
            }
            verdicts.push(readiness.ready);
        }

        info!(
            go = report.go,
            no_go = report.no_go,
            "Launch plan: {} of {} subsystems Go",
            report.go,
            report.checked
        );

        for (managed, ready) in self.subsystems.iter_mut().zip(verdicts) {
            let name = managed.inner.name();
            if !ready {
                warn!(subsystem = name, "Skipping launch: No-Go verdict");
                continue;
            }
            if !self.registry.dependencies_satisfied(managed.id) {
                warn!(subsystem = name, "Skipping launch: dependencies not running");
                self.registry.update_state(managed.id, SubsystemState::Error);
                report.failed += 1;
                continue;
            }

            self.registry.update_state(managed.id, SubsystemState::Starting);
            match managed.inner.start(ctx) {
                Ok(()) => {
                    self.registry.update_state(managed.id, SubsystemState::Running);
                    managed.running = true;
                    report.started += 1;
                    info!(subsystem = name, "Subsystem running");
                }
                Err(err) => {
                    self.registry.update_state(managed.id, SubsystemState::Error);
                    report.failed += 1;
                    error!(subsystem = name, error = %err, "Subsystem failed to start");
                }
            }
        }

        report
    }

    /// Stop every running subsystem in reverse launch order.
    pub fn land_all(&mut self, ctx: &LaunchContext) {
        for managed in self.subsystems.iter_mut().rev() {
            if !managed.running {
                continue;
            }
            let name = managed.inner.name();
            if !self.registry.dependents_stopped(name) {
                // Reverse order normally guarantees this; a violation means
                // the dependency graph and registration order disagree.
                warn!(subsystem = name, "Landing with dependents still running");
            }
            self.registry.update_state(managed.id, SubsystemState::Stopping);
            managed.inner.stop(ctx);
            self.registry.update_state(managed.id, SubsystemState::Stopped);
            managed.running = false;
            info!(subsystem = name, "Subsystem stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

    struct Recorded {
        started_at: Option<usize>,
        stopped_at: Option<usize>,
    }

    struct TestSubsystem {
        name: &'static str,
        dependencies: &'static [&'static str],
        ready: bool,
        fail_start: bool,
        record: Arc<Mutex<Recorded>>,
    }

    impl TestSubsystem {
        fn boxed(
            name: &'static str,
            dependencies: &'static [&'static str],
            ready: bool,
        ) -> (Box<dyn Subsystem>, Arc<Mutex<Recorded>>) {
            let record = Arc::new(Mutex::new(Recorded {
                started_at: None,
                stopped_at: None,
            }));
            (
                Box::new(TestSubsystem {
                    name,
                    dependencies,
                    ready,
                    fail_start: false,
                    record: Arc::clone(&record),
                }),
                record,
            )
        }
    }

    impl Subsystem for TestSubsystem {
        fn name(&self) -> &'static str {
            self.name
        }

        fn dependencies(&self) -> &'static [&'static str] {
            self.dependencies
        }

        fn check_readiness(&self, _ctx: &LaunchContext) -> LaunchReadiness {
            let mut readiness = LaunchReadiness::new(self.name);
            if self.ready {
                readiness.go("configured");
            } else {
                readiness.no_go("not configured");
            }
            readiness
        }

        fn start(&mut self, _ctx: &LaunchContext) -> Result<(), LaunchError> {
            if self.fail_start {
                return Err(LaunchError::start_failed(self.name, "boom"));
            }
            self.record.lock().unwrap().started_at =
                Some(SEQUENCE.fetch_add(1, Ordering::SeqCst));
            Ok(())
        }

        fn stop(&mut self, _ctx: &LaunchContext) {
            self.record.lock().unwrap().stopped_at =
                Some(SEQUENCE.fetch_add(1, Ordering::SeqCst));
        }
    }

    fn test_context() -> (LaunchContext, Arc<SubsystemRegistry>) {
        let registry = Arc::new(SubsystemRegistry::new());
        (
            LaunchContext {
                config: Arc::new(AppConfig::default()),
                registry: Arc::clone(&registry),
            },
            registry,
        )
    }

    #[test]
    fn launch_starts_in_order_and_lands_in_reverse() {
        let (ctx, registry) = test_context();
        let mut orchestrator = Orchestrator::new(Arc::clone(&registry));

        let (network, network_record) = TestSubsystem::boxed("network", &[], true);
        let (webserver, webserver_record) =
            TestSubsystem::boxed("webserver", &["network"], true);
        orchestrator.add(network).unwrap();
        orchestrator.add(webserver).unwrap();

        let report = orchestrator.launch_all(&ctx);
        assert!(report.all_started());
        assert_eq!(report.started, 2);

        let network_start = network_record.lock().unwrap().started_at.unwrap();
        let webserver_start = webserver_record.lock().unwrap().started_at.unwrap();
        assert!(network_start < webserver_start);

        orchestrator.land_all(&ctx);
        let network_stop = network_record.lock().unwrap().stopped_at.unwrap();
        let webserver_stop = webserver_record.lock().unwrap().stopped_at.unwrap();
        assert!(webserver_stop < network_stop);

        let network_id = registry.id_by_name("network").unwrap();
        assert_eq!(registry.state_of(network_id), SubsystemState::Stopped);
    }

    #[test]
    fn no_go_subsystem_is_never_started() {
        let (ctx, registry) = test_context();
        let mut orchestrator = Orchestrator::new(Arc::clone(&registry));

        let (bad, bad_record) = TestSubsystem::boxed("websocket", &[], false);
        orchestrator.add(bad).unwrap();

        let report = orchestrator.launch_all(&ctx);
        assert_eq!(report.no_go, 1);
        assert_eq!(report.started, 0);
        assert!(bad_record.lock().unwrap().started_at.is_none());

        let id = registry.id_by_name("websocket").unwrap();
        assert_eq!(registry.state_of(id), SubsystemState::Stopped);
    }

    #[test]
    fn dependent_of_failed_subsystem_does_not_start() {
        let (ctx, registry) = test_context();
        let mut orchestrator = Orchestrator::new(Arc::clone(&registry));

        let record = Arc::new(Mutex::new(Recorded {
            started_at: None,
            stopped_at: None,
        }));
        orchestrator
            .add(Box::new(TestSubsystem {
                name: "database",
                dependencies: &[],
                ready: true,
                fail_start: true,
                record: Arc::clone(&record),
            }))
            .unwrap();
        let (dependent, dependent_record) =
            TestSubsystem::boxed("webserver", &["database"], true);
        orchestrator.add(dependent).unwrap();

        let report = orchestrator.launch_all(&ctx);
        assert_eq!(report.failed, 2);
        assert!(dependent_record.lock().unwrap().started_at.is_none());

        let database_id = registry.id_by_name("database").unwrap();
        assert_eq!(registry.state_of(database_id), SubsystemState::Error);
    }

    #[test]
    fn registry_dependency_needs_no_launch() {
        let (ctx, registry) = test_context();
        let mut orchestrator = Orchestrator::new(Arc::clone(&registry));

        let (subsystem, record) =
            TestSubsystem::boxed("database", &[crate::REGISTRY_SUBSYSTEM], true);
        orchestrator.add(subsystem).unwrap();

        let report = orchestrator.launch_all(&ctx);
        assert!(report.all_started());
        assert!(record.lock().unwrap().started_at.is_some());
    }
}
