//! Remote InfluxDB instance client
//!
//! The synchronizers talk to an instance only through [`InfluxClient`], so
//! tests can substitute mocks and the HTTP transport stays in one place.
//! [`ClientFactory`] turns a resolved instance binding into a client.

mod http;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use crate::resolver::InstanceBinding;

pub use http::{HttpClientFactory, HttpInfluxClient};
pub use types::{
    AuthorizationCreate, BucketCreate, RemoteAuthorization, RemoteBucket, RemoteOrganization,
    RemotePermission, RemoteResource, RetentionRule,
};

/// Errors returned by an InfluxDB instance client
#[derive(Debug, Error)]
pub enum InfluxError {
    /// The looked-up object does not exist
    ///
    /// Lookups return this as a control signal, not a failure.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind (organization, bucket)
        kind: &'static str,
        /// Name that was looked up
        name: String,
    },

    /// The instance answered with a non-success status
    #[error("unexpected response ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message returned by the instance
        message: String,
    },

    /// The request never completed
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),
}

impl InfluxError {
    /// Returns true for the lookup "not found" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Operations against a single InfluxDB instance
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InfluxClient: Send + Sync {
    /// Look up an organization by name
    async fn find_organization(&self, name: &str) -> Result<RemoteOrganization, InfluxError>;

    /// Update an organization's mutable fields
    async fn update_organization(
        &self,
        org: &RemoteOrganization,
    ) -> Result<RemoteOrganization, InfluxError>;

    /// Look up a bucket by name within one organization
    async fn find_bucket(&self, name: &str, org_id: &str) -> Result<RemoteBucket, InfluxError>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &BucketCreate) -> Result<RemoteBucket, InfluxError>;

    /// Update a bucket's mutable fields
    async fn update_bucket(&self, bucket: &RemoteBucket) -> Result<RemoteBucket, InfluxError>;

    /// Create an authorization; the response carries the one-time token
    async fn create_authorization(
        &self,
        auth: &AuthorizationCreate,
    ) -> Result<RemoteAuthorization, InfluxError>;
}

/// Builds a client bound to one instance's address and credential
#[cfg_attr(test, automock)]
pub trait ClientFactory: Send + Sync {
    /// Create a client for the given binding
    fn connect(&self, binding: &InstanceBinding) -> Result<Arc<dyn InfluxClient>, InfluxError>;
}
