//! Custom Resource Definitions for Paradox
//!
//! This module contains all CRD definitions used by the Paradox operator.

mod authorization;
mod bucket;
mod instance;
mod organization;
mod types;

use kube::CustomResourceExt;

pub use authorization::{
    Action, Authorization, AuthorizationSpec, AuthorizationStatus, Permission, Resource,
    ResourceType, SecretSpec, Token,
};
pub use bucket::{Bucket, BucketSpec, BucketStatus, SchemaType};
pub use instance::{Instance, InstanceSpec};
pub use organization::{
    InstanceAuthorization, InstanceAuthorizationType, InstanceRefs, Organization,
    OrganizationSpec, OrganizationStatus, SecretRef,
};
pub use types::{
    HasInstances, InfluxId, InstanceKey, Instances, InstancesStatus, ResourceInstance,
};

/// Render every Paradox CRD as a multi-document YAML stream
pub fn crds_yaml() -> Result<String, crate::Error> {
    let crds = [
        Instance::crd(),
        Organization::crd(),
        Bucket::crd(),
        Authorization::crd(),
    ];

    let mut out = String::new();
    for crd in crds {
        let yaml =
            serde_yaml::to_string(&crd).map_err(|e| crate::Error::serialization(e.to_string()))?;
        out.push_str("---\n");
        out.push_str(&yaml);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crds_share_api_group() {
        for crd in [
            Instance::crd(),
            Organization::crd(),
            Bucket::crd(),
            Authorization::crd(),
        ] {
            assert_eq!(crd.spec.group, crate::API_GROUP);
            assert_eq!(crd.spec.scope, "Namespaced");
        }
    }

    #[test]
    fn test_crds_yaml_contains_every_kind() {
        let yaml = crds_yaml().unwrap();
        assert_eq!(yaml.matches("---\n").count(), 4);
        for kind in ["Instance", "Organization", "Bucket", "Authorization"] {
            assert!(yaml.contains(&format!("kind: {kind}")), "missing {kind}");
        }
    }
}
