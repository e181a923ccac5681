//! Instance resolution
//!
//! Expands an Organization's `instance_refs` into concrete bindings of
//! address and credential. Resolution is all-or-nothing: the first reference
//! without a usable credential fails the whole reconciliation, so a resource
//! is never fanned out over a partially configured instance set.

use std::fmt;

use tracing::debug;

use crate::crd::{InstanceAuthorization, InstanceAuthorizationType, InstanceKey, Organization};
use crate::store::ResourceStore;
use crate::{Error, Result};

/// A resolved instance: where to reach it and how to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct InstanceBinding {
    /// Namespace and name of the Instance resource
    pub key: InstanceKey,
    /// Base URL of the instance API
    pub address: String,
    token: String,
}

impl InstanceBinding {
    /// Bind an instance to an address and API token
    pub fn new(key: InstanceKey, address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key,
            address: address.into(),
            token: token.into(),
        }
    }

    /// The API token used against this instance
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for InstanceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceBinding")
            .field("key", &self.key)
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Resolve every instance an organization targets
///
/// Bindings are returned in `instance_refs` iteration order (namespace, then
/// name). Credentials are checked before the Instance is fetched.
pub async fn resolve_instances(
    store: &dyn ResourceStore,
    org: &Organization,
) -> Result<Vec<InstanceBinding>> {
    let mut bindings = Vec::new();

    for (namespace, refs) in &org.spec.instance_refs {
        for (name, auth) in refs {
            let key = InstanceKey::new(namespace, name);
            let token = usable_token(&key, auth)?;

            let instance = store.get_instance(namespace, name).await?;
            debug!(instance = %key, address = %instance.spec.address, "resolved instance");

            bindings.push(InstanceBinding::new(key, instance.spec.address, token));
        }
    }

    Ok(bindings)
}

fn usable_token(key: &InstanceKey, auth: &InstanceAuthorization) -> Result<String> {
    let unauthorized = |reason: String| Error::UnauthorizedInstance {
        namespace: key.namespace.clone(),
        name: key.name.clone(),
        reason,
    };

    match auth.type_ {
        InstanceAuthorizationType::Token => match auth.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(unauthorized("token authorization has no token".to_string())),
        },
        InstanceAuthorizationType::Secret => Err(unauthorized(format!(
            "authorization type '{}' is not supported",
            auth.type_
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::crd::{Instance, InstanceSpec, OrganizationSpec, SecretRef};
    use crate::store::MockResourceStore;

    fn sample_organization(refs: Vec<(&str, &str, InstanceAuthorization)>) -> Organization {
        let mut instance_refs: BTreeMap<String, BTreeMap<String, InstanceAuthorization>> =
            BTreeMap::new();
        for (ns, name, auth) in refs {
            instance_refs
                .entry(ns.to_string())
                .or_default()
                .insert(name.to_string(), auth);
        }

        Organization::new(
            "acme",
            OrganizationSpec {
                name: "acme".to_string(),
                description: String::new(),
                instance_refs,
            },
        )
    }

    fn instance(name: &str, address: &str) -> Instance {
        Instance::new(
            name,
            InstanceSpec {
                address: address.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_resolves_every_reference_in_order() {
        let org = sample_organization(vec![
            ("ns", "inst2", InstanceAuthorization::token("t2")),
            ("ns", "inst1", InstanceAuthorization::token("t1")),
        ]);

        let mut store = MockResourceStore::new();
        store
            .expect_get_instance()
            .times(2)
            .returning(|_, name| Ok(instance(name, &format!("http://{name}:8086"))));

        let bindings = resolve_instances(&store, &org).await.unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].key, InstanceKey::new("ns", "inst1"));
        assert_eq!(bindings[0].address, "http://inst1:8086");
        assert_eq!(bindings[0].token(), "t1");
        assert_eq!(bindings[1].token(), "t2");
    }

    /// Story: one malformed reference stops the whole fan-out
    ///
    /// An operator relying on every instance carrying the organization must
    /// not end up with only some of them configured.
    #[tokio::test]
    async fn story_first_unusable_reference_short_circuits() {
        let org = sample_organization(vec![
            ("ns", "inst1", InstanceAuthorization::token("t1")),
            (
                "ns",
                "inst2",
                InstanceAuthorization {
                    type_: InstanceAuthorizationType::Secret,
                    token: None,
                    secret: Some(SecretRef {
                        namespace: "ns".to_string(),
                        name: "admin".to_string(),
                        key: "token".to_string(),
                    }),
                },
            ),
            ("ns", "inst3", InstanceAuthorization::token("t3")),
        ]);

        let mut store = MockResourceStore::new();
        store
            .expect_get_instance()
            .withf(|_, name| name == "inst1")
            .times(1)
            .returning(|_, name| Ok(instance(name, "http://inst1:8086")));

        let err = resolve_instances(&store, &org).await.unwrap_err();
        match err {
            Error::UnauthorizedInstance { name, reason, .. } => {
                assert_eq!(name, "inst2");
                assert!(reason.contains("secret"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_type_without_token_is_unauthorized() {
        let org = sample_organization(vec![(
            "ns",
            "inst1",
            InstanceAuthorization {
                type_: InstanceAuthorizationType::Token,
                token: None,
                secret: None,
            },
        )]);

        let store = MockResourceStore::new();
        let err = resolve_instances(&store, &org).await.unwrap_err();
        assert!(matches!(err, Error::UnauthorizedInstance { .. }));
    }

    #[tokio::test]
    async fn test_missing_instance_propagates() {
        let org = sample_organization(vec![("ns", "gone", InstanceAuthorization::token("t"))]);

        let mut store = MockResourceStore::new();
        store
            .expect_get_instance()
            .returning(|ns, name| Err(Error::not_found("Instance", ns, name)));

        let err = resolve_instances(&store, &org).await.unwrap_err();
        assert_eq!(err.to_string(), "Instance 'ns/gone' not found");
    }

    #[test]
    fn test_binding_debug_redacts_token() {
        let binding = InstanceBinding::new(InstanceKey::new("ns", "inst1"), "http://x", "s3cr3t");
        let rendered = format!("{binding:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("http://x"));
    }
}
