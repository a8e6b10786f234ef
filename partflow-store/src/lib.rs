//! Observable state store for partflow.
//!
//! A single-threaded tree of `serde_json::Value` nodes addressed by dotted
//! paths (`entities.review`), with three notification tiers fired on every
//! write:
//! - direct subscribers of the written path
//! - cascade subscribers of configured child paths (see [`CascadeRule`])
//! - wildcard subscribers, which see every write
//!
//! The store is an explicit instance built through [`PathStore::builder`],
//! shared by cloning the handle. Subscriber callbacks may call back into the
//! store; nested writes run to completion (including their own fan-out)
//! before the outer notification pass resumes.

mod cascade;
mod diagnostics;
mod path;
mod store;
mod subscription;

pub use cascade::{CascadeRule, CascadeRuleConfig, StoreConfig};
pub use diagnostics::{DiagnosticSink, SubscriberFailure, Tier, TracingSink};
pub use path::Path;
pub use store::{PathStore, StoreBuilder, WeakPathStore};
pub use subscription::{CallbackResult, Subscription, SubscriptionKey};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by store operations.
///
/// Subscriber failures are not part of this enum: they are reported to the
/// store's [`DiagnosticSink`] and never returned from a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store accessed before init")]
    NotInitialized,

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A write would have to descend through a value that is not an
    /// object or array.
    #[error("cannot write '{path}': '{blocked_at}' holds a non-container value")]
    PathConflict { path: String, blocked_at: String },
}
