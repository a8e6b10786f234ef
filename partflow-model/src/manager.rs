//! Bucketed part collection on top of the path store.
//!
//! Each part id lives in at most one bucket. Every mutation below reads the
//! current buckets, builds the complete new state, and commits it with a
//! single store write, so subscribers only ever see consistent placements.

use crate::entity::id_of;
use crate::{CategoryConfig, Entity, EntityId, ModelError, ModelResult, Normalizer};
use partflow_store::{Path, PathStore};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Keeps parts partitioned into named buckets under `config.root`.
#[derive(Debug, Clone)]
pub struct CategoryManager {
    store: PathStore,
    config: CategoryConfig,
    root: Path,
    normalizer: Normalizer,
}

impl CategoryManager {
    /// Wrap an initialized (or soon to be initialized) store.
    pub fn new(store: PathStore, config: CategoryConfig) -> ModelResult<Self> {
        config.validate()?;
        let root = config.root_path()?;
        let normalizer = config.normalizer();
        Ok(Self {
            store,
            config,
            root,
            normalizer,
        })
    }

    /// Build a store with the config's cascade rule, initialize it with
    /// empty buckets, and wrap it.
    pub fn with_new_store(config: CategoryConfig) -> ModelResult<Self> {
        config.validate()?;
        let store = config.store_builder()?.build();
        store.init(config.initial_root()?);
        Self::new(store, config)
    }

    #[must_use]
    pub fn store(&self) -> &PathStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &CategoryConfig {
        &self.config
    }

    /// Pure: returns the canonical form of `entity`.
    #[must_use]
    pub fn normalize(&self, entity: Entity) -> Entity {
        self.normalizer.normalize(entity)
    }

    /// Replace the contents of one bucket.
    ///
    /// Normally a single write to `<root>.<bucket>`. If any loaded id is
    /// currently stored in another bucket, the stale copy is evicted and the
    /// whole bucket map is written at once instead.
    pub fn load(&self, bucket: &str, entities: Vec<Entity>) -> ModelResult<()> {
        let path = self.bucket_path(bucket)?;
        let loaded = self.prepare(entities);
        let loaded_ids: HashSet<EntityId> = loaded.iter().filter_map(Entity::id).collect();

        let mut snapshot = self.snapshot()?;
        let mut evicted = 0usize;
        for (name, items) in snapshot.iter_mut() {
            if name == bucket {
                continue;
            }
            if let Value::Array(items) = items {
                let before = items.len();
                items.retain(|v| id_of(v).is_none_or(|id| !loaded_ids.contains(&id)));
                evicted += before - items.len();
            }
        }

        let values = Value::Array(loaded.into_iter().map(Entity::into_value).collect());
        if evicted == 0 {
            self.store.set_at(&path, values)?;
        } else {
            info!(bucket, evicted, "Load moved parts out of other buckets");
            snapshot.insert(bucket.to_string(), values);
            self.commit(snapshot)?;
        }
        Ok(())
    }

    /// Replace the whole bucket map in one write.
    ///
    /// Known buckets missing from `buckets` are written as empty so every
    /// bucket's subscribers fire. An id listed in several buckets is kept in
    /// the last one.
    pub fn load_all<I>(&self, buckets: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = (String, Vec<Entity>)>,
    {
        let mut grouped: Vec<(String, Vec<Entity>)> = Vec::new();
        for (name, entities) in buckets {
            self.bucket_path(&name)?;
            match grouped.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => existing.extend(entities),
                None => grouped.push((name, entities)),
            }
        }
        let prepared: Vec<(String, Vec<Entity>)> = grouped
            .into_iter()
            .map(|(name, entities)| (name, self.prepare(entities)))
            .collect();

        let mut owner: HashMap<EntityId, usize> = HashMap::new();
        for (index, (_, entities)) in prepared.iter().enumerate() {
            for id in entities.iter().filter_map(Entity::id) {
                if let Some(previous) = owner.insert(id.clone(), index) {
                    if previous != index {
                        warn!(id = %id, "Part listed in several buckets, keeping the last");
                    }
                }
            }
        }

        let mut snapshot = Map::new();
        for name in &self.config.buckets {
            snapshot.insert(name.clone(), Value::Array(Vec::new()));
        }
        for (index, (name, entities)) in prepared.into_iter().enumerate() {
            let kept: Vec<Value> = entities
                .into_iter()
                .filter(|e| e.id().is_none_or(|id| owner.get(&id) == Some(&index)))
                .map(Entity::into_value)
                .collect();
            snapshot.insert(name, Value::Array(kept));
        }

        debug!(buckets = snapshot.len(), "Loading all buckets");
        self.commit(snapshot)
    }

    /// Append a part to the bucket named by its `category`, or to the
    /// default bucket (setting `category` accordingly).
    ///
    /// A part whose id is already stored is updated in place instead.
    pub fn add(&self, entity: Entity) -> ModelResult<()> {
        let mut entity = self.normalize(entity);
        if let Some(id) = entity.id() {
            if locate(&self.snapshot()?, &id).is_some() {
                debug!(id = %id, "Part already stored, updating instead of appending");
                return self.upsert_by_id(entity);
            }
        }

        let bucket = match entity.category().map(str::to_string) {
            Some(category) => category,
            None => {
                let bucket = self.config.default_bucket.clone();
                entity.insert("category", bucket.as_str());
                bucket
            }
        };
        let path = self.bucket_path(&bucket)?;
        let value = entity.into_value();
        self.store.update_at(&path, move |current| {
            let mut items = match current {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            items.push(value);
            Value::Array(items)
        })?;
        Ok(())
    }

    /// Replace a stored part, moving it if its `category` changed.
    ///
    /// Fails with [`ModelError::NotFound`] (and writes nothing) if no bucket
    /// holds the id. An update without `category` stays where it is and is
    /// stored with its current bucket as `category`.
    pub fn upsert_by_id(&self, entity: Entity) -> ModelResult<()> {
        let id = entity.id().ok_or(ModelError::MissingId)?;
        let mut snapshot = self.snapshot()?;
        let (current, index) = locate(&snapshot, &id).ok_or_else(|| ModelError::NotFound(id.clone()))?;

        let mut entity = self.normalize(entity);
        let target = match entity.category().map(str::to_string) {
            Some(category) => category,
            None => {
                entity.insert("category", current.as_str());
                current.clone()
            }
        };
        self.bucket_path(&target)?;
        let value = entity.into_value();

        if target == current {
            if let Some(Value::Array(items)) = snapshot.get_mut(&current) {
                items[index] = value;
            }
        } else {
            if let Some(Value::Array(items)) = snapshot.get_mut(&current) {
                items.remove(index);
            }
            match snapshot.get_mut(&target) {
                Some(Value::Array(items)) => items.push(value),
                _ => {
                    snapshot.insert(target.clone(), Value::Array(vec![value]));
                }
            }
            info!(id = %id, from = %current, to = %target, "Part moved");
        }
        self.commit(snapshot)
    }

    /// Remove a part from whichever bucket holds it.
    ///
    /// Returns `false` without writing when the id is unknown; reload and
    /// delete can race, so that is not an error.
    pub fn remove_by_id(&self, id: &EntityId) -> ModelResult<bool> {
        let mut snapshot = self.snapshot()?;
        let Some((bucket, index)) = locate(&snapshot, id) else {
            debug!(id = %id, "Remove of unknown part ignored");
            return Ok(false);
        };
        if let Some(Value::Array(items)) = snapshot.get_mut(&bucket) {
            items.remove(index);
        }
        debug!(id = %id, bucket = %bucket, "Part removed");
        self.commit(snapshot)?;
        Ok(true)
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    pub(crate) fn bucket_path(&self, bucket: &str) -> ModelResult<Path> {
        Ok(self.root.child(bucket)?)
    }

    /// Current bucket map. Missing or non-object roots read as empty.
    pub(crate) fn snapshot(&self) -> ModelResult<Map<String, Value>> {
        match self.store.get_at(&self.root)? {
            Some(Value::Object(map)) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn commit(&self, snapshot: Map<String, Value>) -> ModelResult<()> {
        self.store.set_at(&self.root, Value::Object(snapshot))?;
        Ok(())
    }

    /// Normalize, then collapse duplicate ids (first position, last data).
    fn prepare(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::with_capacity(entities.len());
        let mut seen: HashMap<EntityId, usize> = HashMap::new();
        for entity in entities.into_iter().map(|e| self.normalize(e)) {
            match entity.id() {
                Some(id) => match seen.get(&id) {
                    Some(&at) => {
                        warn!(id = %id, "Duplicate part in batch, keeping the later copy");
                        out[at] = entity;
                    }
                    None => {
                        seen.insert(id, out.len());
                        out.push(entity);
                    }
                },
                None => out.push(entity),
            }
        }
        out
    }
}

/// Bucket name and index of the part with `id`.
pub(crate) fn locate(snapshot: &Map<String, Value>, id: &EntityId) -> Option<(String, usize)> {
    snapshot.iter().find_map(|(name, items)| {
        items
            .as_array()?
            .iter()
            .position(|v| id_of(v).as_ref() == Some(id))
            .map(|index| (name.clone(), index))
    })
}
