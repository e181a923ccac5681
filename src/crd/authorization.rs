//! Authorization Custom Resource Definition
//!
//! An Authorization grants a set of bucket permissions inside its
//! Organization. The token InfluxDB returns is only readable once, at
//! creation, so it can optionally be written into a Kubernetes Secret.

use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::types::{HasInstances, Instances, InstancesStatus};

/// Status for an Authorization
pub type AuthorizationStatus = InstancesStatus;

/// Specification for an Authorization
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "paradox.macro.re",
    version = "v1alpha1",
    kind = "Authorization",
    plural = "authorizations",
    shortname = "authz",
    status = "AuthorizationStatus",
    namespaced,
    printcolumn = r#"{"name":"Organization","type":"string","jsonPath":".spec.organization"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct AuthorizationSpec {
    /// Name of the Organization resource in the same namespace
    pub organization: String,

    /// Description attached to the created authorization
    #[serde(default)]
    pub description: String,

    /// Permissions granted, in declaration order
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Where to materialize the created token
    #[serde(default)]
    pub token: Token,
}

impl AuthorizationSpec {
    /// Validate the authorization specification
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.organization.trim().is_empty() {
            return Err(crate::Error::validation(
                "authorization must reference an organization",
            ));
        }
        if self.permissions.is_empty() {
            return Err(crate::Error::validation(
                "authorization must declare at least one permission",
            ));
        }
        if let Some(secret) = &self.token.secret_spec {
            secret.validate()?;
        }
        Ok(())
    }

    /// Names of every bucket referenced by a permission
    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.permissions
            .iter()
            .filter(|p| p.resource.type_ == ResourceType::Buckets)
            .map(|p| p.resource.name.as_str())
    }
}

impl HasInstances for Authorization {
    fn instances(&self) -> Option<&Instances> {
        self.status.as_ref().map(|s| &s.instances)
    }
}

/// A single permission grant
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Permission {
    /// Granted action
    pub action: Action,
    /// Resource the action applies to
    pub resource: Resource,
}

/// Permission action
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read access
    Read,
    /// Write access
    Write,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Resource a permission applies to, by kind and resource name
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Resource {
    /// Resource kind
    #[serde(rename = "type")]
    pub type_: ResourceType,
    /// Name of the resource in the same namespace
    pub name: String,
}

/// Kind of resource a permission references
///
/// Unknown kinds are kept rather than rejected at parse time, so the
/// controller can report them instead of failing to read the resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// A Bucket resource
    Buckets,
    /// Any kind this operator cannot resolve
    Unsupported(String),
}

impl ResourceType {
    /// Get the string representation of this resource type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Buckets => "buckets",
            Self::Unsupported(other) => other,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        match s {
            "buckets" => Self::Buckets,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl Serialize for ResourceType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

impl JsonSchema for ResourceType {
    fn schema_name() -> String {
        "ResourceType".to_string()
    }

    fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::Schema::Object(schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            metadata: Some(Box::new(schemars::schema::Metadata {
                description: Some("Resource type: currently only 'buckets'".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        })
    }
}

/// Token materialization settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Token {
    /// Secret to write the token into, one per targeted instance
    #[serde(rename = "secretSpec", default, skip_serializing_if = "Option::is_none")]
    pub secret_spec: Option<SecretSpec>,
}

/// Target Secret for a created token
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretSpec {
    /// Namespace the Secret is written to
    pub namespace: String,

    /// Secret name template, rendered against `instance.namespace` and
    /// `instance.name` (e.g. `influx-{{ instance.name }}`)
    #[serde(rename = "nameTemplate")]
    pub name_template: String,

    /// Key the token is stored under
    pub key: String,
}

impl SecretSpec {
    fn validate(&self) -> Result<(), crate::Error> {
        if self.namespace.is_empty() || self.name_template.is_empty() || self.key.is_empty() {
            return Err(crate::Error::validation(
                "token.secretSpec requires namespace, nameTemplate and key",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(type_: &str, name: &str) -> Permission {
        Permission {
            action: Action::Read,
            resource: Resource {
                type_: ResourceType::from(type_),
                name: name.to_string(),
            },
        }
    }

    fn sample_spec() -> AuthorizationSpec {
        AuthorizationSpec {
            organization: "acme".to_string(),
            description: "telegraf".to_string(),
            permissions: vec![permission("buckets", "metrics")],
            token: Token::default(),
        }
    }

    /// Story: unknown resource types survive parsing
    ///
    /// A typo in a permission must surface as a reconcile error naming the
    /// bad type, not as a resource the controller silently cannot read.
    #[test]
    fn story_unknown_resource_type_is_preserved() {
        let parsed: Permission = serde_json::from_value(serde_json::json!({
            "action": "write",
            "resource": {"type": "dashboards", "name": "main"}
        }))
        .unwrap();

        assert_eq!(parsed.action, Action::Write);
        assert_eq!(
            parsed.resource.type_,
            ResourceType::Unsupported("dashboards".to_string())
        );
        assert_eq!(
            serde_json::to_value(&parsed).unwrap()["resource"]["type"],
            "dashboards"
        );
    }

    #[test]
    fn test_parses_stored_token_spec() {
        let spec: AuthorizationSpec = serde_json::from_value(serde_json::json!({
            "organization": "acme",
            "description": "d",
            "permissions": [{"action": "read", "resource": {"type": "buckets", "name": "metrics"}}],
            "token": {"secretSpec": {"namespace": "apps", "nameTemplate": "tok-{{ instance.name }}", "key": "token"}}
        }))
        .unwrap();

        let secret = spec.token.secret_spec.unwrap();
        assert_eq!(secret.namespace, "apps");
        assert_eq!(secret.name_template, "tok-{{ instance.name }}");
    }

    #[test]
    fn test_validation() {
        assert!(sample_spec().validate().is_ok());

        let mut no_perms = sample_spec();
        no_perms.permissions.clear();
        assert!(no_perms.validate().is_err());

        let mut bad_secret = sample_spec();
        bad_secret.token.secret_spec = Some(SecretSpec {
            namespace: "apps".to_string(),
            name_template: String::new(),
            key: "token".to_string(),
        });
        assert!(bad_secret.validate().is_err());
    }

    #[test]
    fn test_bucket_names_skips_other_types() {
        let mut spec = sample_spec();
        spec.permissions.push(permission("dashboards", "main"));
        spec.permissions.push(permission("buckets", "logs"));

        let names: Vec<&str> = spec.bucket_names().collect();
        assert_eq!(names, vec!["metrics", "logs"]);
    }
}
