//! Database subsystem: attaches every enabled connection to the queue
//! manager, spawning its work queues and populating its query cache.

use conduit_dqm::{FixtureExecutor, PendingRegistry, QueryExecutor, QueueManager};
use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use std::sync::Arc;
use tracing::info;

pub struct DatabaseSubsystem {
    manager: Arc<QueueManager>,
    pending: Arc<PendingRegistry>,
}

impl DatabaseSubsystem {
    pub fn new(manager: Arc<QueueManager>, pending: Arc<PendingRegistry>) -> Self {
        DatabaseSubsystem { manager, pending }
    }

    /// The engine adapter used for attached databases.
    ///
    /// Engine integrations implement [`QueryExecutor`] out of tree and
    /// replace this; until then every query resolves through the fixture.
    fn executor_for(&self, _engine: conduit_protocol::EngineType) -> Arc<dyn QueryExecutor> {
        Arc::new(FixtureExecutor::ok())
    }
}

impl Subsystem for DatabaseSubsystem {
    fn name(&self) -> &'static str {
        "database"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["network"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());

        let enabled: Vec<_> = ctx.config.databases.iter().filter(|db| db.enabled).collect();
        if enabled.is_empty() {
            readiness.no_go("No database connections enabled");
            return readiness;
        }

        for db in enabled {
            if db.queues.is_empty() {
                readiness.no_go(format!("Database {} declares no queues", db.connection_name));
                continue;
            }
            readiness.go(format!(
                "Database {}: engine {}, {} cached queries, limit {} per request",
                db.connection_name,
                db.engine,
                db.queries.len(),
                db.max_queries_per_request
            ));
        }

        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        for db in ctx.config.databases.iter().filter(|db| db.enabled) {
            let executor = self.executor_for(db.engine);
            self.manager
                .attach_database(db, executor, Arc::clone(&self.pending))
                .map_err(|err| LaunchError::start_failed(self.name(), err.to_string()))?;
        }
        info!(
            databases = self.manager.database_names().len(),
            "Database queue manager ready"
        );
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        // Worker tasks drain with the runtime; in-flight waiters resolve
        // or time out on their own budgets.
        info!(
            pending = self.pending.pending_count(),
            "Database queue manager stopping"
        );
    }
}
