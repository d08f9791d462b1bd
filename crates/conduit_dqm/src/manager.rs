//! The queue manager.
//!
//! One [`DatabaseRuntime`] per enabled database connection: its query
//! cache, its spawned work queues, and the per-connection rate limit. The
//! manager is built once at launch and passed by reference through the
//! dispatch pipeline; it holds no global state.

use chrono::{DateTime, Utc};
use conduit_protocol::{DatabaseConfig, DatabaseStatus, EngineType, QueueKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::cache::QueryCache;
use crate::error::DqmError;
use crate::executor::QueryExecutor;
use crate::pending::PendingRegistry;
use crate::queue::DatabaseQueue;

/// Everything the dispatch pipeline needs to know about one database.
pub struct DatabaseRuntime {
    pub name: String,
    pub engine: EngineType,
    pub max_queries_per_request: usize,
    pub cache: Arc<QueryCache>,
    queues: HashMap<QueueKind, Arc<DatabaseQueue>>,
    pub migration_status: String,
    pub attached_at: DateTime<Utc>,
}

impl DatabaseRuntime {
    /// Pick a queue for the given kind hint.
    ///
    /// Exact match first; otherwise the least-loaded spawned queue. `None`
    /// only when the database has no queues at all.
    pub fn select_queue(&self, hint: QueueKind) -> Option<Arc<DatabaseQueue>> {
        if let Some(queue) = self.queues.get(&hint) {
            return Some(Arc::clone(queue));
        }
        self.queues
            .values()
            .min_by_key(|queue| queue.depth())
            .map(Arc::clone)
    }

    pub fn queue_kinds(&self) -> Vec<QueueKind> {
        self.queues.keys().copied().collect()
    }
}

/// Registry of attached databases.
#[derive(Default)]
pub struct QueueManager {
    databases: RwLock<HashMap<String, Arc<DatabaseRuntime>>>,
}

impl QueueManager {
    pub fn new() -> Self {
        QueueManager::default()
    }

    /// Build the runtime for one configured database: populate its query
    /// cache and spawn one work queue per configured kind.
    pub fn attach_database(
        &self,
        config: &DatabaseConfig,
        executor: Arc<dyn QueryExecutor>,
        pending: Arc<PendingRegistry>,
    ) -> Result<(), DqmError> {
        let cache = Arc::new(QueryCache::from_definitions(
            &config.queries,
            config.default_timeout_seconds,
        ));

        let mut queues = HashMap::with_capacity(config.queues.len());
        for kind in &config.queues {
            let queue = DatabaseQueue::spawn(
                config.connection_name.clone(),
                *kind,
                config.workers_per_queue,
                Arc::clone(&executor),
                Arc::clone(&pending),
            );
            queues.insert(*kind, queue);
        }

        let runtime = Arc::new(DatabaseRuntime {
            name: config.connection_name.clone(),
            engine: config.engine,
            max_queries_per_request: config.max_queries_per_request,
            cache: Arc::clone(&cache),
            queues,
            migration_status: "current".to_string(),
            attached_at: Utc::now(),
        });

        info!(
            database = %config.connection_name,
            engine = %config.engine,
            cached_queries = cache.len(),
            queues = config.queues.len(),
            "Database attached"
        );

        self.databases
            .write()
            .expect("queue manager lock poisoned")
            .insert(config.connection_name.clone(), runtime);
        Ok(())
    }

    /// Look up an attached database. `None` is the database-not-found
    /// condition, distinct from query-not-found everywhere downstream.
    pub fn database(&self, name: &str) -> Option<Arc<DatabaseRuntime>> {
        self.databases
            .read()
            .expect("queue manager lock poisoned")
            .get(name)
            .map(Arc::clone)
    }

    /// Select a work queue for a database and kind hint.
    pub fn select_queue(&self, database: &str, hint: QueueKind) -> Option<Arc<DatabaseQueue>> {
        self.database(database)?.select_queue(hint)
    }

    pub fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .expect("queue manager lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Per-database status for the status endpoint.
    pub fn status_snapshot(&self) -> BTreeMap<String, DatabaseStatus> {
        let now = Utc::now().to_rfc3339();
        self.databases
            .read()
            .expect("queue manager lock poisoned")
            .values()
            .map(|runtime| {
                (
                    runtime.name.clone(),
                    DatabaseStatus {
                        ready: !runtime.queue_kinds().is_empty(),
                        migration_status: runtime.migration_status.clone(),
                        query_cache_entries: runtime.cache.len(),
                        last_checked: now.clone(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FixtureExecutor;
    use conduit_protocol::QueryDefinition;

    fn config(name: &str, queues: Vec<QueueKind>) -> DatabaseConfig {
        DatabaseConfig {
            connection_name: name.to_string(),
            enabled: true,
            engine: EngineType::Sqlite,
            max_queries_per_request: 10,
            queues,
            workers_per_queue: 1,
            default_timeout_seconds: 30,
            queries: vec![QueryDefinition {
                query_ref: 1,
                sql: "SELECT 1".to_string(),
                queue: QueueKind::Fast,
                timeout_seconds: None,
                description: "probe".to_string(),
                public: true,
            }],
        }
    }

    #[tokio::test]
    async fn attach_exposes_runtime_and_status() {
        let manager = QueueManager::new();
        let pending = Arc::new(PendingRegistry::new());
        manager
            .attach_database(
                &config("main", vec![QueueKind::Slow, QueueKind::Fast]),
                Arc::new(FixtureExecutor::ok()),
                pending,
            )
            .unwrap();

        let runtime = manager.database("main").unwrap();
        assert_eq!(runtime.engine, EngineType::Sqlite);
        assert_eq!(runtime.cache.len(), 1);

        let status = manager.status_snapshot();
        assert!(status["main"].ready);
        assert_eq!(status["main"].query_cache_entries, 1);
        assert_eq!(status["main"].migration_status, "current");
    }

    #[tokio::test]
    async fn unknown_database_is_distinct_from_unknown_query() {
        let manager = QueueManager::new();
        let pending = Arc::new(PendingRegistry::new());
        manager
            .attach_database(
                &config("main", vec![QueueKind::Fast]),
                Arc::new(FixtureExecutor::ok()),
                pending,
            )
            .unwrap();

        assert!(manager.database("other").is_none());
        let runtime = manager.database("main").unwrap();
        assert!(runtime.cache.lookup(999).is_none());
    }

    #[tokio::test]
    async fn selection_prefers_hint_then_falls_back() {
        let manager = QueueManager::new();
        let pending = Arc::new(PendingRegistry::new());
        manager
            .attach_database(
                &config("main", vec![QueueKind::Slow, QueueKind::Fast]),
                Arc::new(FixtureExecutor::ok()),
                pending,
            )
            .unwrap();

        let exact = manager.select_queue("main", QueueKind::Fast).unwrap();
        assert_eq!(exact.kind(), QueueKind::Fast);

        // Cache queue is not spawned; fallback picks a spawned queue.
        let fallback = manager.select_queue("main", QueueKind::Cache).unwrap();
        assert!(matches!(fallback.kind(), QueueKind::Slow | QueueKind::Fast));

        assert!(manager.select_queue("missing", QueueKind::Fast).is_none());
    }
}
