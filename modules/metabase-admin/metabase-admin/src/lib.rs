//! Metabase admin client
//!
//! Session handling, optimistic permission graph updates and entity CRUD for
//! a Metabase instance. The public contract lives in `metabase-admin-sdk`;
//! this crate provides [`MetabaseClient`], which implements it.
//!
//! ```ignore
//! use metabase_admin::{MetabaseClient, MetabaseConfig};
//! use metabase_admin_sdk::{AccessSpec, CollectionId, GroupId, Permission, PermissionGraphClient};
//!
//! let config = MetabaseConfig::load(Some("metabase.yaml".as_ref()))?;
//! let client = MetabaseClient::connect(&config).await?;
//! let spec = AccessSpec::new(Permission::None).grant(GroupId(3), Permission::Write);
//! client.update_collection_access(&CollectionId::from(7), &spec).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod client;
pub mod config;
pub mod domain;
pub mod infra;

pub use client::MetabaseClient;
pub use config::{ConfigError, GraphRetryConfig, MetabaseConfig};
pub use domain::cache::{ListCache, ListCaches};
pub use domain::overlay::{extract, merge, overlay};
pub use domain::ports::GraphStore;
pub use domain::session::{Credentials, SessionManager};
pub use domain::sync::{GraphSynchronizer, RetryPolicy};
pub use infra::rest::RestGraphStore;
