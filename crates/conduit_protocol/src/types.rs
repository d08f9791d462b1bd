//! Canonical enums shared across the conduit crates.
//!
//! These are the single source of truth for engine and queue naming; the
//! string forms are what appears in configuration files and API responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database engine family.
///
/// Only the positional-parameter marker convention depends on this: Postgres
/// uses `$1..$n`, everything else uses `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Postgres,
    Sqlite,
    Mysql,
    Db2,
}

impl EngineType {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineType::Postgres => "postgres",
            EngineType::Sqlite => "sqlite",
            EngineType::Mysql => "mysql",
            EngineType::Db2 => "db2",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(EngineType::Postgres),
            "sqlite" => Ok(EngineType::Sqlite),
            "mysql" => Ok(EngineType::Mysql),
            "db2" => Ok(EngineType::Db2),
            other => Err(format!("unknown engine type: {}", other)),
        }
    }
}

/// Work queue kind within one database.
///
/// Each database spawns one or more of these; a query cache entry carries a
/// kind hint that the queue selector honors when possible. The supervisory
/// lead queue is internal to the queue manager and is never selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Slow,
    Medium,
    Fast,
    Cache,
}

impl QueueKind {
    pub const ALL: [QueueKind; 4] = [
        QueueKind::Slow,
        QueueKind::Medium,
        QueueKind::Fast,
        QueueKind::Cache,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Slow => "slow",
            QueueKind::Medium => "medium",
            QueueKind::Fast => "fast",
            QueueKind::Cache => "cache",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(QueueKind::Slow),
            "medium" => Ok(QueueKind::Medium),
            "fast" => Ok(QueueKind::Fast),
            "cache" => Ok(QueueKind::Cache),
            other => Err(format!("unknown queue kind: {}", other)),
        }
    }
}
