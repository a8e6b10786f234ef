//! Cascade rules and store configuration.

use crate::{Path, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// When `parent` is written with an object value, subscribers of
/// `parent.<child>` are also notified for every configured child key that
/// is present in the object.
///
/// A child key missing from the written object is skipped: its subscribers
/// keep whatever they last saw rather than being told the child became
/// absent.
///
/// A rule built with [`CascadeRule::include_unlisted`] also notifies keys
/// that are present but not configured, after the configured ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeRule {
    parent: Path,
    children: Vec<(String, Path)>,
    include_unlisted: bool,
}

impl CascadeRule {
    /// Create a rule from a dotted parent path and its child keys.
    ///
    /// Children are notified in the order given. Duplicate keys are dropped.
    pub fn new<I, S>(parent: &str, children: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parent = Path::parse(parent)?;
        let mut resolved: Vec<(String, Path)> = Vec::new();
        for key in children {
            let key = key.as_ref();
            if resolved.iter().any(|(k, _)| k == key) {
                continue;
            }
            resolved.push((key.to_string(), parent.child(key)?));
        }
        Ok(Self {
            parent,
            children: resolved,
            include_unlisted: false,
        })
    }

    /// Also cascade into keys of the written object that are not listed,
    /// in the object's key order. Keys that are not valid path segments
    /// are skipped, since nothing can subscribe to them.
    #[must_use]
    pub fn include_unlisted(mut self) -> Self {
        self.include_unlisted = true;
        self
    }

    #[must_use]
    pub fn includes_unlisted(&self) -> bool {
        self.include_unlisted
    }

    #[must_use]
    pub fn parent(&self) -> &Path {
        &self.parent
    }

    /// Child keys in notification order.
    pub fn child_keys(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(k, _)| k.as_str())
    }

    /// Child paths to notify for a write of `map` to the parent, with the
    /// value each one receives.
    pub(crate) fn targets<'a>(&self, map: &'a Map<String, Value>) -> Vec<(Path, &'a Value)> {
        let mut out: Vec<(Path, &'a Value)> = self
            .children
            .iter()
            .filter_map(|(key, path)| map.get(key).map(|v| (path.clone(), v)))
            .collect();
        if self.include_unlisted {
            for (key, value) in map {
                if self.children.iter().any(|(k, _)| k == key) {
                    continue;
                }
                if let Ok(path) = self.parent.child(key) {
                    out.push((path, value));
                }
            }
        }
        out
    }
}

/// Serializable form of a cascade rule, as found in config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeRuleConfig {
    pub parent: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub include_unlisted: bool,
}

/// Declarative store configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub cascade: Vec<CascadeRuleConfig>,
}

impl StoreConfig {
    /// Validate and resolve every configured rule.
    pub fn rules(&self) -> Result<Vec<CascadeRule>> {
        self.cascade
            .iter()
            .map(|r| -> Result<CascadeRule> {
                let rule = CascadeRule::new(&r.parent, &r.children)?;
                Ok(if r.include_unlisted {
                    rule.include_unlisted()
                } else {
                    rule
                })
            })
            .collect()
    }
}
