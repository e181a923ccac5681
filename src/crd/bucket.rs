//! Bucket Custom Resource Definition

use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{HasInstances, Instances, InstancesStatus};

/// Status for a Bucket
pub type BucketStatus = InstancesStatus;

/// Specification for a Bucket
///
/// Only the description is reconciled after creation; name, schema type and
/// retention are applied when the bucket is first created on an instance.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "paradox.macro.re",
    version = "v1alpha1",
    kind = "Bucket",
    plural = "buckets",
    shortname = "bkt",
    status = "BucketStatus",
    namespaced,
    printcolumn = r#"{"name":"Name","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Organization","type":"string","jsonPath":".spec.organization"}"#,
    printcolumn = r#"{"name":"Retention","type":"string","jsonPath":".spec.retention_policy"}"#
)]
pub struct BucketSpec {
    /// Bucket name on every targeted instance
    pub name: String,

    /// Name of the Organization resource in the same namespace
    pub organization: String,

    /// Description kept in sync on every targeted instance
    #[serde(default)]
    pub description: String,

    /// Schema type applied at creation
    #[serde(rename = "schema_type", default)]
    pub schema_type: SchemaType,

    /// Retention period as a duration string (e.g. "720h"); empty means infinite
    #[serde(rename = "retention_policy", default)]
    pub retention_policy: String,
}

impl BucketSpec {
    /// Validate the bucket specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::validation("bucket name must not be empty"));
        }
        if self.organization.trim().is_empty() {
            return Err(crate::Error::validation(format!(
                "bucket '{}' must reference an organization",
                self.name
            )));
        }
        Ok(())
    }
}

impl HasInstances for Bucket {
    fn instances(&self) -> Option<&Instances> {
        self.status.as_ref().map(|s| &s.instances)
    }
}

/// Bucket schema type
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// Schema inferred from written data
    #[default]
    Implicit,
    /// Schema declared up front
    Explicit,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit => write!(f, "implicit"),
            Self::Explicit => write!(f, "explicit"),
        }
    }
}
