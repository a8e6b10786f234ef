//! Part entities and workflow buckets for partflow.
//!
//! Defines the domain layer that sits on top of [`partflow_store::PathStore`]:
//! - [`Entity`] / [`EntityId`]: an open JSON object with a stable id
//! - [`Normalizer`]: coerces `amount` and the display identifier
//! - [`CategoryConfig`]: bucket names, root path, display and search fields
//! - [`CategoryManager`]: keeps every part in exactly one bucket
//!
//! Every mutation the manager performs is a single store write, so
//! subscribers never observe a part in two buckets or in none.

mod config;
mod entity;
mod error;
mod manager;
mod normalize;
mod query;

pub use config::CategoryConfig;
pub use entity::{Entity, EntityId};
pub use error::{ModelError, ModelResult};
pub use manager::CategoryManager;
pub use normalize::{Normalizer, normalize, parse_amount};
pub use query::{
    AssignmentCounts, BucketStats, ListQuery, Page, STATUS_COMPLETED, STATUS_IN_PROGRESS,
    STATUS_PENDING, SortOrder, StatusCounts,
};
