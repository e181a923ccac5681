//! Paradox - Kubernetes operator for InfluxDB resources across many instances
//!
//! Paradox reconciles a small hierarchy of declared resources against one or
//! more independently-addressed InfluxDB instances:
//!
//! - `Organization` resources name the instances they target and carry the
//!   credentials used to reach them
//! - `Bucket` resources are created inside their organization on every
//!   targeted instance
//! - `Authorization` resources grant bucket permissions and optionally
//!   materialize the resulting token into a Kubernetes Secret
//!
//! The identifier each instance assigns is recorded in the resource status
//! so repeated reconciliations are idempotent.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions and the per-instance status map
//! - [`influx`] - Remote instance client abstraction and HTTP implementation
//! - [`store`] - Object store and secret materialization seams
//! - [`resolver`] - Expands an organization's instance references into bindings
//! - [`sync`] - Per-kind create-or-update against a single instance
//! - [`controller`] - Reconciliation entrypoints and fan-out across instances
//! - [`template`] - Secret name templating
//! - [`config`] - Controller runtime configuration
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod influx;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod template;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all Paradox custom resources
pub const API_GROUP: &str = "paradox.macro.re";

/// Default field manager used for server-side apply and status patches
pub const DEFAULT_FIELD_MANAGER: &str = "paradox-controller";

/// Label key marking resources created by the operator
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Label value for [`LABEL_MANAGED_BY`]
pub const LABEL_MANAGED_BY_PARADOX: &str = "paradox";
