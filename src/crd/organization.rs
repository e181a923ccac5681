//! Organization Custom Resource Definition
//!
//! An Organization declares which InfluxDB instances the hierarchy targets
//! and how to authenticate against each. Buckets and Authorizations in the
//! same namespace fan out over the instances their Organization names.

use std::collections::BTreeMap;
use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{HasInstances, Instances, InstancesStatus};

/// Status for an Organization
pub type OrganizationStatus = InstancesStatus;

/// Instance references: namespace → instance name → authorization
pub type InstanceRefs = BTreeMap<String, BTreeMap<String, InstanceAuthorization>>;

/// Specification for an Organization
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "paradox.macro.re",
    version = "v1alpha1",
    kind = "Organization",
    plural = "organizations",
    shortname = "org",
    status = "OrganizationStatus",
    namespaced,
    printcolumn = r#"{"name":"Name","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct OrganizationSpec {
    /// Organization name on every targeted instance
    pub name: String,

    /// Description kept in sync on every targeted instance
    #[serde(default)]
    pub description: String,

    /// Targeted instances with the credentials used to reach them
    #[serde(rename = "instance_refs", default)]
    pub instance_refs: InstanceRefs,
}

impl OrganizationSpec {
    /// Validate the organization specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::validation("organization name must not be empty"));
        }
        Ok(())
    }
}

impl HasInstances for Organization {
    fn instances(&self) -> Option<&Instances> {
        self.status.as_ref().map(|s| &s.instances)
    }
}

/// How the operator authenticates against an instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceAuthorizationType {
    /// Inline token carried on the Organization
    #[default]
    Token,
    /// Token read from a Kubernetes Secret
    Secret,
}

impl fmt::Display for InstanceAuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => write!(f, "token"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

/// Credential for one instance reference
///
/// Tagged by `type`; only the `token` variant is currently actionable.
#[derive(Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct InstanceAuthorization {
    /// Which credential source applies
    #[serde(rename = "type")]
    pub type_: InstanceAuthorizationType,

    /// Inline token (for `type: token`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Secret holding the token (for `type: secret`)
    #[serde(rename = "secretRef", default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretRef>,
}

impl InstanceAuthorization {
    /// Inline token authorization
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            type_: InstanceAuthorizationType::Token,
            token: Some(token.into()),
            secret: None,
        }
    }
}

impl fmt::Debug for InstanceAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceAuthorization")
            .field("type_", &self.type_)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("secret", &self.secret)
            .finish()
    }
}

/// Reference to a key within a Kubernetes Secret
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretRef {
    /// Namespace of the Secret
    pub namespace: String,
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret data
    pub key: String,
}
