//! Watch mappers for dependent resources
//!
//! A Bucket cannot sync until its Organization has an identifier for the
//! instance, and an Authorization waits on both. These mappers requeue the
//! dependents when a dependency changes, so the hierarchy converges without
//! waiting for the periodic requeue.

use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;

use crate::crd::{Authorization, Bucket, Organization};

fn same_namespace<K: ResourceExt>(a: &K, namespace: &Option<String>) -> bool {
    &a.namespace() == namespace
}

/// Buckets in the organization's namespace that reference it
pub fn buckets_for_organization(buckets: &Store<Bucket>, org: &Organization) -> Vec<ObjectRef<Bucket>> {
    let namespace = org.namespace();
    let name = org.name_any();

    buckets
        .state()
        .iter()
        .filter(|b| same_namespace(b.as_ref(), &namespace) && b.spec.organization == name)
        .map(|b| ObjectRef::from_obj(b.as_ref()))
        .collect()
}

/// Authorizations in the organization's namespace that reference it
pub fn authorizations_for_organization(
    authorizations: &Store<Authorization>,
    org: &Organization,
) -> Vec<ObjectRef<Authorization>> {
    let namespace = org.namespace();
    let name = org.name_any();

    authorizations
        .state()
        .iter()
        .filter(|a| same_namespace(a.as_ref(), &namespace) && a.spec.organization == name)
        .map(|a| ObjectRef::from_obj(a.as_ref()))
        .collect()
}

/// Authorizations in the bucket's namespace with a permission naming it
pub fn authorizations_for_bucket(
    authorizations: &Store<Authorization>,
    bucket: &Bucket,
) -> Vec<ObjectRef<Authorization>> {
    let namespace = bucket.namespace();
    let name = bucket.name_any();

    authorizations
        .state()
        .iter()
        .filter(|a| {
            same_namespace(a.as_ref(), &namespace) && a.spec.bucket_names().any(|b| b == name)
        })
        .map(|a| ObjectRef::from_obj(a.as_ref()))
        .collect()
}
