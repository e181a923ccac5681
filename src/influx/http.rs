//! InfluxDB v2 HTTP client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::types::{
    AuthorizationCreate, BucketCreate, RemoteAuthorization, RemoteBucket, RemoteOrganization,
};
use super::{ClientFactory, InfluxClient, InfluxError};
use crate::resolver::InstanceBinding;

/// Error body returned by InfluxDB on non-success responses
#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Organizations {
    #[serde(default)]
    orgs: Vec<RemoteOrganization>,
}

#[derive(Deserialize)]
struct Buckets {
    #[serde(default)]
    buckets: Vec<RemoteBucket>,
}

/// Client for one instance, authenticated with an API token
pub struct HttpInfluxClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpInfluxClient {
    /// Create a client sharing an existing connection pool
    pub fn new(http: reqwest::Client, address: &str, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: address.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
    }

    /// Send a request and decode the JSON body
    ///
    /// When `lookup` is set, a 404 becomes [`InfluxError::NotFound`] for
    /// that kind and name.
    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        lookup: Option<(&'static str, &str)>,
    ) -> Result<T, InfluxError> {
        let response = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| InfluxError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| InfluxError::Decode(e.to_string()));
        }

        if let (StatusCode::NOT_FOUND, Some((kind, name))) = (status, lookup) {
            return Err(InfluxError::NotFound {
                kind,
                name: name.to_string(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(InfluxError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// Extract a readable message from an InfluxDB error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            code: Some(code),
            message: Some(message),
        }) => format!("{code}: {message}"),
        Ok(ApiErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ if body.is_empty() => "empty response body".to_string(),
        _ => body.to_string(),
    }
}

#[async_trait]
impl InfluxClient for HttpInfluxClient {
    async fn find_organization(&self, name: &str) -> Result<RemoteOrganization, InfluxError> {
        let req = self.http.get(self.url("orgs")).query(&[("org", name)]);
        let found: Organizations = self.send(req, Some(("organization", name))).await?;

        found
            .orgs
            .into_iter()
            .find(|org| org.name == name)
            .ok_or_else(|| InfluxError::NotFound {
                kind: "organization",
                name: name.to_string(),
            })
    }

    async fn update_organization(
        &self,
        org: &RemoteOrganization,
    ) -> Result<RemoteOrganization, InfluxError> {
        debug!(org = %org.id, "updating organization");
        let body = serde_json::json!({ "description": org.description });
        let req = self
            .http
            .patch(self.url(&format!("orgs/{}", org.id)))
            .json(&body);
        self.send(req, None).await
    }

    async fn find_bucket(&self, name: &str, org_id: &str) -> Result<RemoteBucket, InfluxError> {
        let req = self
            .http
            .get(self.url("buckets"))
            .query(&[("name", name), ("orgID", org_id)]);
        let found: Buckets = self.send(req, Some(("bucket", name))).await?;

        found
            .buckets
            .into_iter()
            .find(|bucket| {
                bucket.name == name && bucket.org_id.as_deref().map_or(true, |id| id == org_id)
            })
            .ok_or_else(|| InfluxError::NotFound {
                kind: "bucket",
                name: name.to_string(),
            })
    }

    async fn create_bucket(&self, bucket: &BucketCreate) -> Result<RemoteBucket, InfluxError> {
        debug!(bucket = %bucket.name, "creating bucket");
        let req = self.http.post(self.url("buckets")).json(bucket);
        self.send(req, None).await
    }

    async fn update_bucket(&self, bucket: &RemoteBucket) -> Result<RemoteBucket, InfluxError> {
        debug!(bucket = %bucket.id, "updating bucket");
        let body = serde_json::json!({ "description": bucket.description });
        let req = self
            .http
            .patch(self.url(&format!("buckets/{}", bucket.id)))
            .json(&body);
        self.send(req, None).await
    }

    async fn create_authorization(
        &self,
        auth: &AuthorizationCreate,
    ) -> Result<RemoteAuthorization, InfluxError> {
        debug!(org = %auth.org_id, permissions = auth.permissions.len(), "creating authorization");
        let req = self.http.post(self.url("authorizations")).json(auth);
        self.send(req, None).await
    }
}

/// Creates [`HttpInfluxClient`]s that share one connection pool
pub struct HttpClientFactory {
    http: reqwest::Client,
}

impl HttpClientFactory {
    /// Create a factory whose clients time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, InfluxError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InfluxError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, binding: &InstanceBinding) -> Result<Arc<dyn InfluxClient>, InfluxError> {
        Ok(Arc::new(HttpInfluxClient::new(
            self.http.clone(),
            &binding.address,
            binding.token(),
        )))
    }
}
