//! Batch deduplication and rate limiting.
//!
//! Collapses structurally-identical queries within one batch to a single
//! execution. Two items are duplicates when their `query_ref` is equal AND
//! their `params` objects are deeply equal; an omitted `params` compares
//! as the empty object. Malformed items (not an object, missing or
//! non-integer `query_ref`) are marked duplicate and skipped rather than
//! failing the batch.

use serde_json::Value;

/// One accepted unique query with its first-occurrence index.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueQuery {
    pub query_ref: i32,
    pub params: Value,
    pub first_index: usize,
}

/// Index bookkeeping for one batch.
///
/// Invariant: for every `i` with `is_duplicate[i] == false`, `mapping[i]`
/// indexes a valid entry of `unique`; the first occurrence of each unique
/// pair is never marked duplicate. Both arrays always have the original
/// batch length.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub unique: Vec<UniqueQuery>,
    pub mapping: Vec<usize>,
    pub is_duplicate: Vec<bool>,
}

/// Why a batch was rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupRejection {
    /// More unique queries than the database allows per request.
    RateLimit { unique_count: usize, limit: usize },
}

fn item_key(item: &Value) -> Option<(i32, Value)> {
    let obj = item.as_object()?;
    let query_ref = obj.get("query_ref")?.as_i64()?;
    let query_ref = i32::try_from(query_ref).ok()?;
    let params = obj
        .get("params")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    Some((query_ref, params))
}

/// Deduplicate a batch and enforce the unique-query rate limit.
pub fn deduplicate_queries(
    items: &[Value],
    limit: usize,
) -> Result<DedupOutcome, DedupRejection> {
    let mut unique: Vec<UniqueQuery> = Vec::new();
    let mut mapping = vec![0usize; items.len()];
    let mut is_duplicate = vec![false; items.len()];

    for (index, item) in items.iter().enumerate() {
        let Some((query_ref, params)) = item_key(item) else {
            is_duplicate[index] = true;
            continue;
        };

        if let Some(existing) = unique
            .iter()
            .position(|u| u.query_ref == query_ref && u.params == params)
        {
            mapping[index] = existing;
            is_duplicate[index] = true;
            continue;
        }

        mapping[index] = unique.len();
        unique.push(UniqueQuery {
            query_ref,
            params,
            first_index: index,
        });
    }

    if unique.len() > limit {
        return Err(DedupRejection::RateLimit {
            unique_count: unique.len(),
            limit,
        });
    }

    Ok(DedupOutcome {
        unique,
        mapping,
        is_duplicate,
    })
}

/// The rate-limited partial-execution fallback.
///
/// Instead of rejecting the whole batch, execute queries up to the limit:
/// the prefix covers the first `limit` ORIGINAL items, so an early
/// duplicate consumes an execution slot even though it is not separately
/// executed. Duplicates within the prefix are still collapsed; everything
/// at index `limit` and beyond gets a synthetic rate-limit entry at remap
/// time.
pub fn partial_execution_prefix(items: &[Value], limit: usize) -> DedupOutcome {
    let prefix = limit.min(items.len());
    let mut outcome = deduplicate_queries(&items[..prefix], usize::MAX)
        .expect("unbounded dedup cannot hit the rate limit");
    outcome.mapping.resize(items.len(), 0);
    outcome.is_duplicate.resize(items.len(), true);
    outcome
}
