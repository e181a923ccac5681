//! Error types for the Paradox operator
//!
//! Errors carry the instance (`namespace/name`) they were raised against
//! wherever one is known, so operators can tell which target failed.

use thiserror::Error;

use crate::influx::InfluxError;
use crate::template::TemplateError;

/// Main error type for Paradox operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// An instance reference does not carry a usable credential
    #[error("instance '{namespace}/{name}' has no usable authorization: {reason}")]
    UnauthorizedInstance {
        /// Namespace of the instance reference
        namespace: String,
        /// Name of the instance reference
        name: String,
        /// Why the authorization was rejected
        reason: String,
    },

    /// A resource referenced by name does not exist in the object store
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        /// Resource kind (Instance, Organization, Bucket)
        kind: &'static str,
        /// Namespace the lookup was made in
        namespace: String,
        /// Name that was looked up
        name: String,
    },

    /// A call against a remote instance failed
    #[error("influx instance '{namespace}/{name}': {source}")]
    Remote {
        /// Namespace of the instance
        namespace: String,
        /// Name of the instance
        name: String,
        /// The underlying client error
        #[source]
        source: InfluxError,
    },

    /// The organization does not exist on the remote instance
    ///
    /// Organizations are observe-only: creating them would need provisioning
    /// credentials this operator does not hold.
    #[error("organization '{organization}' does not exist on influx instance '{namespace}/{name}'")]
    OrganizationNotFound {
        /// Organization name looked up on the instance
        organization: String,
        /// Namespace of the instance
        namespace: String,
        /// Name of the instance
        name: String,
    },

    /// A dependency has not been provisioned on the target instance yet
    #[error("{kind} '{dependency}' has no id recorded for influx instance '{namespace}/{name}'")]
    MissingDependency {
        /// Kind of the dependency (Organization, Bucket)
        kind: &'static str,
        /// Name of the dependency resource
        dependency: String,
        /// Namespace of the instance
        namespace: String,
        /// Name of the instance
        name: String,
    },

    /// A permission references a resource type that cannot be resolved
    #[error("unsupported resource type {0:?}")]
    UnsupportedResourceType(String),

    /// Secret name template could not be rendered
    #[error("attempting secret creation: {0}")]
    Template(#[from] TemplateError),

    /// The token could not be written to its secret
    #[error("attempting secret creation for '{namespace}/{name}': {message}")]
    SecretMaterialization {
        /// Namespace of the secret
        namespace: String,
        /// Name of the secret
        name: String,
        /// Description of what failed
        message: String,
    },

    /// Validation error for CRD specs
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Reconciliation was cancelled before it completed
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a not-found error for a referenced resource
    pub fn not_found(
        kind: &'static str,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Wrap a client error with the instance it was raised against
    pub fn remote(namespace: impl Into<String>, name: impl Into<String>, source: InfluxError) -> Self {
        Self::Remote {
            namespace: namespace.into(),
            name: name.into(),
            source,
        }
    }

    /// Whether retrying without a spec or remote change can succeed
    ///
    /// Configuration problems stay broken until someone edits a resource,
    /// so the error policy backs off further for those.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UnauthorizedInstance { .. }
                | Self::OrganizationNotFound { .. }
                | Self::UnsupportedResourceType(_)
                | Self::Validation(_)
                | Self::Template(_)
        )
    }

    /// The `namespace/name` of the instance this error is attributed to, if any
    pub fn instance(&self) -> Option<String> {
        match self {
            Self::UnauthorizedInstance { namespace, name, .. }
            | Self::Remote { namespace, name, .. }
            | Self::OrganizationNotFound { namespace, name, .. }
            | Self::MissingDependency { namespace, name, .. } => {
                Some(format!("{namespace}/{name}"))
            }
            _ => None,
        }
    }
}
