//! Supporting types shared by the Paradox CRDs
//!
//! The central type here is [`Instances`], the status projection every kind
//! records: namespace → instance name → identifier assigned by that instance.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a resource by a remote InfluxDB instance
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct InfluxId(String);

impl InfluxId {
    /// The raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfluxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for InfluxId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for InfluxId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Per-instance record stored in every status map
///
/// An absent `id` means the resource is not provisioned on that instance yet.
/// The field is omitted on the wire rather than written as `null`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceInstance {
    /// Identifier assigned by the remote instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<InfluxId>,
}

/// Identity of a targeted instance: its namespace and name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceKey {
    /// Namespace of the Instance resource
    pub namespace: String,
    /// Name of the Instance resource
    pub name: String,
}

impl InstanceKey {
    /// Create a key from a namespace and name
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Status projection: namespace → instance name → identifier
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(transparent)]
pub struct Instances(BTreeMap<String, BTreeMap<String, ResourceInstance>>);

impl Instances {
    /// An empty projection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identifier an instance assigned
    ///
    /// A `None` id is ignored so the map never holds placeholder entries.
    pub fn add_instance(&mut self, key: &InstanceKey, id: Option<InfluxId>) {
        let Some(id) = id else {
            return;
        };

        self.0
            .entry(key.namespace.clone())
            .or_default()
            .insert(key.name.clone(), ResourceInstance { id: Some(id) });
    }

    /// The identifier recorded for an instance, if any
    pub fn id_for(&self, key: &InstanceKey) -> Option<&InfluxId> {
        self.0
            .get(&key.namespace)
            .and_then(|names| names.get(&key.name))
            .and_then(|instance| instance.id.as_ref())
    }

    /// Drop every entry whose instance is not in `targets`
    pub fn retain_targets<'a>(&mut self, targets: impl IntoIterator<Item = &'a InstanceKey>) {
        let targets: Vec<&InstanceKey> = targets.into_iter().collect();
        for (namespace, names) in self.0.iter_mut() {
            names.retain(|name, _| {
                targets
                    .iter()
                    .any(|t| &t.namespace == namespace && &t.name == name)
            });
        }
        self.0.retain(|_, names| !names.is_empty());
    }

    /// Copy every recorded identifier from `other` into this map
    pub fn merge(&mut self, other: &Instances) {
        for (key, id) in other.iter() {
            self.add_instance(&key, Some(id.clone()));
        }
    }

    /// Iterate over every recorded `(instance, id)` pair
    pub fn iter(&self) -> impl Iterator<Item = (InstanceKey, &InfluxId)> + '_ {
        self.0.iter().flat_map(|(namespace, names)| {
            names.iter().filter_map(move |(name, instance)| {
                instance
                    .id
                    .as_ref()
                    .map(|id| (InstanceKey::new(namespace, name), id))
            })
        })
    }

    /// Iterate over every record, including those without an identifier
    pub fn entries(&self) -> impl Iterator<Item = (InstanceKey, &ResourceInstance)> + '_ {
        self.0.iter().flat_map(|(namespace, names)| {
            names
                .iter()
                .map(move |(name, instance)| (InstanceKey::new(namespace, name), instance))
        })
    }

    /// Number of instances with a recorded identifier
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if no identifier is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status shared by Organization, Bucket and Authorization
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct InstancesStatus {
    /// Identifier assigned by every instance this resource is provisioned on
    #[serde(default)]
    pub instances: Instances,
}

impl InstancesStatus {
    /// Status wrapping the given projection
    pub fn new(instances: Instances) -> Self {
        Self { instances }
    }
}

/// Read access to the status projection of any Paradox resource
pub trait HasInstances {
    /// The recorded projection, if the resource has a status at all
    fn instances(&self) -> Option<&Instances>;

    /// The identifier recorded for `key`, if any
    fn id_for(&self, key: &InstanceKey) -> Option<&InfluxId> {
        self.instances().and_then(|i| i.id_for(key))
    }
}
