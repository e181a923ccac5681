//! Wire types for the InfluxDB v2 API
//!
//! Only the fields the synchronizers read or write are modelled; unknown
//! response fields are ignored.

use serde::{Deserialize, Serialize};

use crate::crd::{Action, SchemaType};

/// Organization as returned by an instance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteOrganization {
    /// Identifier assigned by the instance
    pub id: String,
    /// Organization name
    pub name: String,
    /// Organization description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Bucket as returned by an instance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteBucket {
    /// Identifier assigned by the instance
    pub id: String,
    /// Bucket name
    pub name: String,
    /// Owning organization identifier
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Bucket description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Retention rules in effect
    #[serde(rename = "retentionRules", default)]
    pub retention_rules: Vec<RetentionRule>,
}

/// Request body for bucket creation
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BucketCreate {
    /// Bucket name
    pub name: String,
    /// Owning organization identifier
    #[serde(rename = "orgID")]
    pub org_id: String,
    /// Bucket description
    pub description: String,
    /// Retention rules; empty means infinite retention
    #[serde(rename = "retentionRules")]
    pub retention_rules: Vec<RetentionRule>,
    /// Schema type
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
}

/// Bucket retention rule
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RetentionRule {
    /// Rule type; InfluxDB only defines `expire`
    #[serde(rename = "type", default = "RetentionRule::expire_type")]
    pub type_: String,
    /// Seconds data is kept for
    #[serde(rename = "everySeconds")]
    pub every_seconds: i64,
}

impl RetentionRule {
    /// An expiry rule keeping data for `every_seconds`
    pub fn expire(every_seconds: i64) -> Self {
        Self {
            type_: Self::expire_type(),
            every_seconds,
        }
    }

    fn expire_type() -> String {
        "expire".to_string()
    }
}

/// Request body for authorization creation
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AuthorizationCreate {
    /// Owning organization identifier
    #[serde(rename = "orgID")]
    pub org_id: String,
    /// Authorization description
    pub description: String,
    /// Granted permissions
    pub permissions: Vec<RemotePermission>,
}

/// A permission as submitted to an instance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemotePermission {
    /// Granted action
    pub action: Action,
    /// Target resource
    pub resource: RemoteResource,
}

/// Permission target as submitted to an instance
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteResource {
    /// Resource kind (e.g. `buckets`)
    #[serde(rename = "type")]
    pub type_: String,
    /// Identifier of the specific resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning organization identifier
    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

/// Authorization as returned by an instance on creation
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteAuthorization {
    /// Identifier assigned by the instance
    pub id: String,
    /// One-time token; only returned by the create call
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for RemoteAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAuthorization")
            .field("id", &self.id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
