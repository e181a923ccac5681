//! Integration tests for CRD operations
//!
//! These tests tell the story of how platform teams declare InfluxDB
//! resources through the Kubernetes API, and how the operator's status
//! writes look from the API server's side.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;

use paradox::crd::{
    Action, Authorization, AuthorizationSpec, Bucket, BucketSpec, InfluxId, Instance,
    InstanceAuthorization, InstanceKey, InstanceSpec, Organization, OrganizationSpec, Permission,
    Resource, ResourceType, SchemaType, SecretSpec, Token,
};

use super::helpers::{ensure_namespace, ensure_test_cluster};

const TEST_NAMESPACE: &str = "paradox-test";

// =============================================================================
// Test Fixtures
// =============================================================================

fn metadata(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(TEST_NAMESPACE.to_string()),
        ..Default::default()
    }
}

fn sample_instance(name: &str) -> Instance {
    Instance {
        metadata: metadata(name),
        spec: InstanceSpec {
            address: format!("http://{name}.influx:8086"),
        },
    }
}

fn sample_organization(name: &str, instances: &[&str]) -> Organization {
    let refs: BTreeMap<String, InstanceAuthorization> = instances
        .iter()
        .map(|i| (i.to_string(), InstanceAuthorization::token("admin-token")))
        .collect();

    Organization {
        metadata: metadata(name),
        spec: OrganizationSpec {
            name: "acme".to_string(),
            description: "Acme telemetry".to_string(),
            instance_refs: BTreeMap::from([(TEST_NAMESPACE.to_string(), refs)]),
        },
        status: None,
    }
}

fn sample_bucket(name: &str, organization: &str) -> Bucket {
    Bucket {
        metadata: metadata(name),
        spec: BucketSpec {
            name: name.to_string(),
            organization: organization.to_string(),
            description: "host metrics".to_string(),
            schema_type: SchemaType::Implicit,
            retention_policy: "720h".to_string(),
        },
        status: None,
    }
}

fn sample_authorization(name: &str, organization: &str, bucket: &str) -> Authorization {
    Authorization {
        metadata: metadata(name),
        spec: AuthorizationSpec {
            organization: organization.to_string(),
            description: "telegraf writer".to_string(),
            permissions: vec![
                Permission {
                    action: Action::Read,
                    resource: Resource {
                        type_: ResourceType::Buckets,
                        name: bucket.to_string(),
                    },
                },
                Permission {
                    action: Action::Write,
                    resource: Resource {
                        type_: ResourceType::Buckets,
                        name: bucket.to_string(),
                    },
                },
            ],
            token: Token {
                secret_spec: Some(SecretSpec {
                    namespace: TEST_NAMESPACE.to_string(),
                    name_template: "influx-{{ instance.name }}".to_string(),
                    key: "token".to_string(),
                }),
            },
        },
        status: None,
    }
}

/// Helper to cleanup a namespaced resource
async fn cleanup<K>(client: &Client, name: &str)
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
{
    let api: Api<K> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

async fn setup() -> Client {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    ensure_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("failed to create test namespace");
    client
}

// =============================================================================
// Declaration Stories
// =============================================================================

/// Story: Platform team registers an InfluxDB instance
///
/// Instances are plain address records; credentials live on the
/// Organization that targets them.
///
/// Expected behavior:
/// - The Instance is created and its address is persisted
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_registers_instance() {
    let client = setup().await;
    let api: Api<Instance> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-inst-register";
    cleanup::<Instance>(&client, name).await;

    api.create(&PostParams::default(), &sample_instance(name))
        .await
        .expect("failed to create instance");

    let fetched = api.get(name).await.expect("failed to get instance");
    assert_eq!(
        fetched.spec.address,
        format!("http://{name}.influx:8086")
    );

    cleanup::<Instance>(&client, name).await;
}

/// Story: Platform team declares an organization across two instances
///
/// Expected behavior:
/// - Instance references round-trip under the `instance_refs` field
/// - Inline tokens are kept with their authorization type
/// - A fresh organization has no status yet
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_declares_organization_across_instances() {
    let client = setup().await;
    let api: Api<Organization> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-org-declare";
    cleanup::<Organization>(&client, name).await;

    let created = api
        .create(
            &PostParams::default(),
            &sample_organization(name, &["inst1", "inst2"]),
        )
        .await
        .expect("failed to create organization");
    assert!(created.status.is_none());

    let fetched = api.get(name).await.expect("failed to get organization");
    assert_eq!(fetched.spec.name, "acme");
    assert_eq!(
        fetched.spec.instance_refs[TEST_NAMESPACE]
            .keys()
            .collect::<Vec<_>>(),
        vec!["inst1", "inst2"]
    );
    let inst1 = &fetched.spec.instance_refs[TEST_NAMESPACE]["inst1"];
    assert_eq!(inst1, &InstanceAuthorization::token("admin-token"));

    cleanup::<Organization>(&client, name).await;
}

/// Story: Platform team declares a bucket and a writer token for it
///
/// Expected behavior:
/// - The bucket keeps its retention policy as written
/// - The authorization keeps both permissions and its secret template
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_team_declares_bucket_and_writer_token() {
    let client = setup().await;
    let buckets: Api<Bucket> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let authorizations: Api<Authorization> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    cleanup::<Bucket>(&client, "metrics").await;
    cleanup::<Authorization>(&client, "telegraf").await;

    buckets
        .create(&PostParams::default(), &sample_bucket("metrics", "acme"))
        .await
        .expect("failed to create bucket");
    authorizations
        .create(
            &PostParams::default(),
            &sample_authorization("telegraf", "acme", "metrics"),
        )
        .await
        .expect("failed to create authorization");

    let bucket = buckets.get("metrics").await.expect("failed to get bucket");
    assert_eq!(bucket.spec.retention_policy, "720h");
    assert_eq!(bucket.spec.schema_type, SchemaType::Implicit);

    let auth = authorizations
        .get("telegraf")
        .await
        .expect("failed to get authorization");
    assert_eq!(auth.spec.permissions.len(), 2);
    assert_eq!(auth.spec.bucket_names().collect::<Vec<_>>(), vec!["metrics", "metrics"]);
    assert_eq!(
        auth.spec.token.secret_spec.as_ref().map(|s| s.key.as_str()),
        Some("token")
    );

    cleanup::<Bucket>(&client, "metrics").await;
    cleanup::<Authorization>(&client, "telegraf").await;
}

// =============================================================================
// Status Stories
// =============================================================================

/// Story: An instance is removed from an organization after provisioning
///
/// The operator replaces the status projection rather than merging into it,
/// by writing removed entries as nulls.
///
/// Expected behavior:
/// - Both identifiers are visible after the first status write
/// - Only the remaining instance is visible after the second
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_removed_instance_disappears_from_status() {
    let client = setup().await;
    let api: Api<Organization> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-org-status";
    cleanup::<Organization>(&client, name).await;

    api.create(
        &PostParams::default(),
        &sample_organization(name, &["inst1", "inst2"]),
    )
    .await
    .expect("failed to create organization");

    let params = PatchParams::default();
    let both = json!({"status": {"instances": {TEST_NAMESPACE: {
        "inst1": {"id": "0x1"},
        "inst2": {"id": "0x2"}
    }}}});
    api.patch_status(name, &params, &Patch::Merge(&both))
        .await
        .expect("failed to write status");

    let inst1 = InstanceKey::new(TEST_NAMESPACE, "inst1");
    let inst2 = InstanceKey::new(TEST_NAMESPACE, "inst2");

    let fetched = api.get(name).await.expect("failed to get organization");
    let instances = &fetched.status.as_ref().expect("status written").instances;
    assert_eq!(instances.id_for(&inst1), Some(&InfluxId::from("0x1")));
    assert_eq!(instances.id_for(&inst2), Some(&InfluxId::from("0x2")));

    let remaining = json!({"status": {"instances": {TEST_NAMESPACE: {
        "inst1": {"id": "0x1"},
        "inst2": null
    }}}});
    api.patch_status(name, &params, &Patch::Merge(&remaining))
        .await
        .expect("failed to replace status");

    let fetched = api.get(name).await.expect("failed to get organization");
    let instances = &fetched.status.as_ref().expect("status kept").instances;
    assert_eq!(instances.id_for(&inst1), Some(&InfluxId::from("0x1")));
    assert_eq!(instances.id_for(&inst2), None);
    assert_eq!(instances.len(), 1);

    cleanup::<Organization>(&client, name).await;
}

/// Story: A status write based on a stale read is rejected
///
/// Expected behavior:
/// - A patch carrying an outdated resourceVersion fails with a conflict
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_stale_status_write_conflicts() {
    let client = setup().await;
    let api: Api<Bucket> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-bucket-conflict";
    cleanup::<Bucket>(&client, name).await;

    let created = api
        .create(&PostParams::default(), &sample_bucket(name, "acme"))
        .await
        .expect("failed to create bucket");
    let stale = created.metadata.resource_version.clone().unwrap_or_default();

    let mut updated = created.clone();
    updated.spec.description = "changed".to_string();
    api.replace(name, &PostParams::default(), &updated)
        .await
        .expect("failed to update bucket");

    let patch = json!({
        "metadata": {"resourceVersion": stale},
        "status": {"instances": {TEST_NAMESPACE: {"inst1": {"id": "b1"}}}}
    });
    let result = api
        .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await;

    match result {
        Err(kube::Error::Api(e)) => assert_eq!(e.code, 409),
        other => panic!("expected conflict, got {other:?}"),
    }

    cleanup::<Bucket>(&client, name).await;
}
