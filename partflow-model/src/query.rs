//! Read-only views over the buckets: listing, lookup, search, paging and
//! counts.

use crate::entity::id_of;
use crate::manager::locate;
use crate::{CategoryManager, Entity, EntityId, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_COMPLETED: &str = "Completed";

/// Part counts per bucket, workflow status and assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStats {
    pub total: usize,
    /// Sum of `amount` over every part.
    pub total_amount: u64,
    pub by_category: BTreeMap<String, usize>,
    pub by_status: StatusCounts,
    pub assignment: AssignmentCounts,
}

/// Parts whose `status` is exactly one of the known workflow statuses.
/// Other statuses are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// A part is unassigned when `assigned` is missing, null or empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCounts {
    pub assigned: usize,
    pub unassigned: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filters, ordering and paging for [`CategoryManager::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Matched like [`CategoryManager::search`]; `None` matches everything.
    pub search: Option<String>,
    /// Restrict to one bucket.
    pub category: Option<String>,
    /// Field to order by. Without it parts keep bucket order.
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One page of [`CategoryManager::list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub parts: Vec<Entity>,
    /// Matches before paging.
    pub total: usize,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl CategoryManager {
    /// Parts in one bucket, in stored order. Unknown buckets are empty.
    pub fn bucket(&self, name: &str) -> ModelResult<Vec<Entity>> {
        let path = self.bucket_path(name)?;
        Ok(match self.store().get_at(&path)? {
            Some(Value::Array(items)) => entities_of(items),
            _ => Vec::new(),
        })
    }

    /// Every bucket, configured ones first (in config order, even when
    /// empty), then any others by name.
    pub fn buckets(&self) -> ModelResult<Vec<(String, Vec<Entity>)>> {
        let mut snapshot = self.snapshot()?;
        let mut out = Vec::new();
        for name in &self.config().buckets {
            let items = match snapshot.remove(name) {
                Some(Value::Array(items)) => entities_of(items),
                _ => Vec::new(),
            };
            out.push((name.clone(), items));
        }
        let mut rest: Vec<(String, Value)> = snapshot.into_iter().collect();
        rest.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in rest {
            if let Value::Array(items) = value {
                out.push((name, entities_of(items)));
            }
        }
        Ok(out)
    }

    /// The bucket holding `id` and the stored part.
    pub fn find_by_id(&self, id: &EntityId) -> ModelResult<Option<(String, Entity)>> {
        let snapshot = self.snapshot()?;
        let Some((bucket, index)) = locate(&snapshot, id) else {
            return Ok(None);
        };
        let entity = snapshot
            .get(&bucket)
            .and_then(Value::as_array)
            .and_then(|items| items.get(index))
            .cloned()
            .and_then(|v| Entity::from_value(v).ok());
        Ok(entity.map(|e| (bucket, e)))
    }

    /// Case-insensitive substring search over the configured search fields,
    /// optionally limited to one bucket. An empty query matches everything.
    pub fn search(&self, query: &str, category: Option<&str>) -> ModelResult<Vec<Entity>> {
        let needle = query.trim().to_lowercase();
        let fields = &self.config().search_fields;
        let mut hits = Vec::new();
        for (name, entities) in self.buckets()? {
            if category.is_some_and(|c| c != name) {
                continue;
            }
            hits.extend(
                entities
                    .into_iter()
                    .filter(|e| needle.is_empty() || matches(e.as_map(), fields, &needle)),
            );
        }
        Ok(hits)
    }

    pub fn stats(&self) -> ModelResult<BucketStats> {
        let mut stats = BucketStats::default();
        for (name, entities) in self.buckets()? {
            stats.total += entities.len();
            stats.by_category.insert(name, entities.len());
            for entity in &entities {
                stats.total_amount += entity.amount().unwrap_or(1);
                match entity.get_str("status") {
                    Some(STATUS_PENDING) => stats.by_status.pending += 1,
                    Some(STATUS_IN_PROGRESS) => stats.by_status.in_progress += 1,
                    Some(STATUS_COMPLETED) => stats.by_status.completed += 1,
                    _ => {}
                }
                if is_assigned(entity.get("assigned")) {
                    stats.assignment.assigned += 1;
                } else {
                    stats.assignment.unassigned += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Search, sort and page across buckets.
    ///
    /// Sorting is stable, so parts with equal keys keep bucket order in
    /// both directions. `offset` applies with or without `limit`.
    pub fn list(&self, query: &ListQuery) -> ModelResult<Page> {
        let mut parts = self.search(
            query.search.as_deref().unwrap_or(""),
            query.category.as_deref(),
        )?;
        if let Some(field) = &query.sort_by {
            parts.sort_by(|a, b| {
                let ord = compare_field(a.get(field), b.get(field));
                match query.sort_order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }
        let total = parts.len();
        let parts = parts
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(Page {
            parts,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// Ids currently stored, with their bucket. Used to check placement.
    pub fn placements(&self) -> ModelResult<Vec<(EntityId, String)>> {
        let snapshot = self.snapshot()?;
        let mut out = Vec::new();
        for (name, items) in &snapshot {
            if let Some(items) = items.as_array() {
                out.extend(items.iter().filter_map(id_of).map(|id| (id, name.clone())));
            }
        }
        Ok(out)
    }
}

fn entities_of(items: Vec<Value>) -> Vec<Entity> {
    items
        .into_iter()
        .filter_map(|v| Entity::from_value(v).ok())
        .collect()
}

fn is_assigned(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Missing and null sort first, then booleans, numbers and strings.
/// Strings compare case-insensitively.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn matches(fields_map: &Map<String, Value>, fields: &[String], needle: &str) -> bool {
    fields.iter().any(|field| match fields_map.get(field) {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Number(n)) => n.to_string().contains(needle),
        _ => false,
    })
}
