//! Snapshot loading, edits and rendering for the `partflow` binary.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use partflow_model::{CategoryConfig, CategoryManager, Entity, EntityId, ListQuery, ModelError};
use partflow_store::{PathStore, Subscription};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

/// A `--move ID=CATEGORY` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub id: EntityId,
    pub category: String,
}

/// Parse `ID=CATEGORY`. Numeric ids become integer ids.
pub fn parse_move(raw: &str) -> Result<MoveRequest, String> {
    let (id, category) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=CATEGORY, got '{raw}'"))?;
    let category = category.trim();
    if category.is_empty() {
        return Err(format!("missing category in '{raw}'"));
    }
    Ok(MoveRequest {
        id: parse_id(id)?,
        category: category.to_string(),
    })
}

/// Parse a part id given on the command line.
pub fn parse_id(raw: &str) -> Result<EntityId, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("id must not be empty".to_string());
    }
    let Ok(id) = raw.parse::<EntityId>();
    Ok(id)
}

pub fn read_config(path: &Path) -> Result<CategoryConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    CategoryConfig::from_json_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))
}

/// Split a snapshot document into buckets.
///
/// Accepts either a bucket map (`{"review": [...], ...}`) or a flat array
/// of parts, which is grouped by each part's `category` (parts without one
/// go to the default bucket). Bucket order follows first appearance.
pub fn parse_snapshot(doc: Value, config: &CategoryConfig) -> Result<Vec<(String, Vec<Entity>)>> {
    match doc {
        Value::Object(map) => map
            .into_iter()
            .map(|(name, items)| {
                let Value::Array(items) = items else {
                    bail!("bucket '{name}' must be an array");
                };
                let entities = items
                    .into_iter()
                    .map(Entity::from_value)
                    .collect::<Result<Vec<_>, ModelError>>()
                    .with_context(|| format!("Invalid part in bucket '{name}'"))?;
                Ok((name, entities))
            })
            .collect(),
        Value::Array(items) => {
            let mut buckets: Vec<(String, Vec<Entity>)> = Vec::new();
            for (index, item) in items.into_iter().enumerate() {
                let entity = Entity::from_value(item)
                    .with_context(|| format!("Invalid part at index {index}"))?;
                let name = entity
                    .category()
                    .unwrap_or(&config.default_bucket)
                    .to_string();
                match buckets.iter_mut().find(|(n, _)| *n == name) {
                    Some((_, entities)) => entities.push(entity),
                    None => buckets.push((name, vec![entity])),
                }
            }
            Ok(buckets)
        }
        _ => bail!("snapshot must be an object of buckets or an array of parts"),
    }
}

/// Read a snapshot file and load it into a fresh manager.
pub fn open_snapshot(path: &Path, config: CategoryConfig) -> Result<CategoryManager> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let doc: Value = serde_json::from_str(&text)
        .with_context(|| format!("Snapshot {} is not valid JSON", path.display()))?;
    let buckets = parse_snapshot(doc, &config)?;
    let manager = CategoryManager::with_new_store(config)?;
    manager.load_all(buckets)?;
    info!(path = %path.display(), "Snapshot loaded");
    Ok(manager)
}

/// Write the current bucket map back out as a snapshot.
pub fn save_snapshot(manager: &CategoryManager, path: &Path) -> Result<()> {
    let mut doc = serde_json::Map::new();
    for (name, entities) in manager.buckets()? {
        doc.insert(
            name,
            Value::Array(entities.into_iter().map(Entity::into_value).collect()),
        );
    }
    let text = serde_json::to_string_pretty(&Value::Object(doc))?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Snapshot saved");
    Ok(())
}

/// Log every store write at debug level.
pub fn trace_writes(store: &PathStore) -> Subscription {
    store.subscribe_all(|change, _| {
        debug!(path = %change["path"], "Store write");
        Ok(())
    })
}

/// What [`apply_edits`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    pub moved: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    /// Ids named by an edit that no bucket holds.
    pub missing: Vec<EntityId>,
}

/// Apply moves, then removals. Unknown ids are reported, not fatal.
pub fn apply_edits(
    manager: &CategoryManager,
    moves: &[MoveRequest],
    removals: &[EntityId],
) -> Result<EditReport> {
    let mut report = EditReport::default();
    for request in moves {
        let Some((from, mut entity)) = manager.find_by_id(&request.id)? else {
            warn!(id = %request.id, "Cannot move unknown part");
            report.missing.push(request.id.clone());
            continue;
        };
        if from == request.category {
            debug!(id = %request.id, bucket = %from, "Part already in target bucket");
            continue;
        }
        entity.insert("category", request.category.as_str());
        manager
            .upsert_by_id(entity)
            .with_context(|| format!("Failed to move part {}", request.id))?;
        report.moved.push(request.id.clone());
    }
    for id in removals {
        if manager
            .remove_by_id(id)
            .with_context(|| format!("Failed to remove part {id}"))?
        {
            report.removed.push(id.clone());
        } else {
            warn!(id = %id, "Cannot remove unknown part");
            report.missing.push(id.clone());
        }
    }
    Ok(report)
}

/// Plain-text output. Without a query: one block per bucket. With one: a
/// flat, sorted and paged listing. Totals come last either way.
pub fn render_text(manager: &CategoryManager, query: Option<&ListQuery>) -> Result<String> {
    let display = &manager.config().display_field;
    let mut out = String::new();
    match query {
        Some(query) => {
            let page = manager.list(query)?;
            out.push_str(&format!(
                "showing {} of {} match(es)\n",
                page.parts.len(),
                page.total
            ));
            for entity in &page.parts {
                out.push_str(&format!(
                    "  {:<24} [{}]\n",
                    entity.get_str(display).unwrap_or(""),
                    entity.category().unwrap_or("-")
                ));
            }
        }
        None => {
            for (name, entities) in manager.buckets()? {
                out.push_str(&format!("{name} ({})\n", entities.len()));
                for entity in &entities {
                    let line = format!(
                        "  {:<24} x{:<4} {}",
                        entity.get_str(display).unwrap_or(""),
                        entity.amount().unwrap_or(1),
                        entity.get_str("status").unwrap_or("")
                    );
                    out.push_str(line.trim_end());
                    out.push('\n');
                }
            }
        }
    }
    let stats = manager.stats()?;
    out.push_str(&format!(
        "{} part(s), {} piece(s), {} assigned\n",
        stats.total, stats.total_amount, stats.assignment.assigned
    ));
    Ok(out)
}

/// JSON output with the same content as [`render_text`].
pub fn render_json(manager: &CategoryManager, query: Option<&ListQuery>) -> Result<Value> {
    let stats = serde_json::to_value(manager.stats()?)?;
    Ok(match query {
        Some(query) => {
            let page = serde_json::to_value(manager.list(query)?)?;
            json!({ "query": query, "page": page, "stats": stats })
        }
        None => {
            let buckets: Vec<Value> = manager
                .buckets()?
                .into_iter()
                .map(|(name, entities)| {
                    let parts: Vec<Value> = entities.into_iter().map(Entity::into_value).collect();
                    json!({ "name": name, "parts": parts })
                })
                .collect();
            json!({ "buckets": buckets, "stats": stats })
        }
    })
}
