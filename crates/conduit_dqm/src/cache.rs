//! Query table cache.
//!
//! Maps an integer query reference to its SQL template and execution
//! metadata. Populated once when a database is attached and read-only
//! afterwards; entries outlive any single request, so the dispatch
//! pipeline only ever borrows them.

use conduit_protocol::{QueryDefinition, QueueKind};
use std::collections::HashMap;

/// One cached query.
#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    pub query_ref: i32,
    pub sql_template: String,
    pub queue_type: QueueKind,
    pub timeout_seconds: i64,
    pub description: String,
    pub public: bool,
}

/// Read-only lookup table for one database's registered queries.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<i32, QueryCacheEntry>,
}

impl QueryCache {
    /// Build the cache from configured query definitions.
    ///
    /// A definition without its own timeout inherits the database default.
    pub fn from_definitions(definitions: &[QueryDefinition], default_timeout: i64) -> Self {
        let mut entries = HashMap::with_capacity(definitions.len());
        for def in definitions {
            entries.insert(
                def.query_ref,
                QueryCacheEntry {
                    query_ref: def.query_ref,
                    sql_template: def.sql.clone(),
                    queue_type: def.queue,
                    timeout_seconds: def.timeout_seconds.unwrap_or(default_timeout),
                    description: def.description.clone(),
                    public: def.public,
                },
            );
        }
        QueryCache { entries }
    }

    pub fn lookup(&self, query_ref: i32) -> Option<&QueryCacheEntry> {
        self.entries.get(&query_ref)
    }

    /// Lookup restricted to publicly visible entries.
    pub fn lookup_public(&self, query_ref: i32) -> Option<&QueryCacheEntry> {
        self.entries.get(&query_ref).filter(|entry| entry.public)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(query_ref: i32, public: bool, timeout: Option<i64>) -> QueryDefinition {
        QueryDefinition {
            query_ref,
            sql: "SELECT 1".to_string(),
            queue: QueueKind::Fast,
            timeout_seconds: timeout,
            description: String::new(),
            public,
        }
    }

    #[test]
    fn timeout_falls_back_to_database_default() {
        let cache =
            QueryCache::from_definitions(&[definition(1, true, None), definition(2, true, Some(5))], 30);
        assert_eq!(cache.lookup(1).unwrap().timeout_seconds, 30);
        assert_eq!(cache.lookup(2).unwrap().timeout_seconds, 5);
    }

    #[test]
    fn public_lookup_hides_private_entries() {
        let cache = QueryCache::from_definitions(&[definition(7, false, None)], 30);
        assert!(cache.lookup(7).is_some());
        assert!(cache.lookup_public(7).is_none());
    }

    #[test]
    fn unknown_reference_is_absent() {
        let cache = QueryCache::from_definitions(&[], 30);
        assert!(cache.lookup(99).is_none());
        assert!(cache.is_empty());
    }
}
