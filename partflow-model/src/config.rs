use crate::normalize::{DEFAULT_DISPLAY_FIELD, DEFAULT_DISPLAY_SOURCES};
use crate::{ModelError, ModelResult, Normalizer};
use partflow_store::{CascadeRule, Path, PathStore, StoreBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Layout of the bucketed part collection.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```json
/// { "buckets": ["review", "cnc", "hand", "completed", "scrap"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    /// Dotted store path holding the bucket map.
    pub root: String,
    /// Known buckets, in display order. Parts may still name other
    /// categories; those buckets are created on demand.
    pub buckets: Vec<String>,
    /// Bucket used by `add` when a part has no `category`.
    pub default_bucket: String,
    /// Field that receives the display identifier.
    pub display_field: String,
    /// Fallback chain for the display identifier.
    pub display_sources: Vec<String>,
    /// Fields matched by `search`.
    pub search_fields: Vec<String>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            root: "entities".to_string(),
            buckets: ["review", "cnc", "hand", "completed"]
                .map(String::from)
                .to_vec(),
            default_bucket: "review".to_string(),
            display_field: DEFAULT_DISPLAY_FIELD.to_string(),
            display_sources: DEFAULT_DISPLAY_SOURCES.map(String::from).to_vec(),
            search_fields: [
                "name",
                "notes",
                "subsystem",
                "assigned",
                "material",
                "partId",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl CategoryConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ModelResult<()> {
        let root = self.root_path()?;
        if root.is_root() {
            return Err(ModelError::InvalidConfig(
                "root must not be the empty path".to_string(),
            ));
        }
        for bucket in self.buckets.iter().chain(std::iter::once(&self.default_bucket)) {
            root.child(bucket)
                .map_err(|e| ModelError::InvalidConfig(format!("bucket '{bucket}': {e}")))?;
        }
        if self.display_field.is_empty() {
            return Err(ModelError::InvalidConfig(
                "display_field must not be empty".to_string(),
            ));
        }
        if self.display_sources.is_empty() {
            return Err(ModelError::InvalidConfig(
                "display_sources must name at least one field".to_string(),
            ));
        }
        Ok(())
    }

    pub fn root_path(&self) -> ModelResult<Path> {
        Path::parse(&self.root)
            .map_err(|e| ModelError::InvalidConfig(format!("root '{}': {e}", self.root)))
    }

    /// Cascade rule that fans a bulk write of the bucket map out to each
    /// bucket's subscribers: known buckets first, in config order, then any
    /// bucket created on demand.
    pub fn cascade_rule(&self) -> ModelResult<CascadeRule> {
        Ok(CascadeRule::new(&self.root, &self.buckets)?.include_unlisted())
    }

    /// A store builder pre-loaded with [`Self::cascade_rule`].
    pub fn store_builder(&self) -> ModelResult<StoreBuilder> {
        Ok(PathStore::builder().cascade_rule(self.cascade_rule()?))
    }

    /// Root tree with every known bucket present and empty.
    pub fn initial_root(&self) -> ModelResult<Value> {
        let root = self.root_path()?;
        let buckets: Map<String, Value> = self
            .buckets
            .iter()
            .map(|b| (b.clone(), Value::Array(Vec::new())))
            .collect();
        Ok(root
            .segments()
            .iter()
            .rev()
            .fold(Value::Object(buckets), |inner, seg| {
                let mut node = Map::new();
                node.insert(seg.clone(), inner);
                Value::Object(node)
            }))
    }

    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.display_field.clone(), self.display_sources.clone())
    }
}
