// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP/JSON client for the downstream admin API

use crate::admin::api::{
    AccessKey, AdminApi, AdminConnector, AdminEndpoint, AdminError, Bucket, BucketDetails,
    CreateBucketRequest, Identity, IdentityPolicy,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const API_PREFIX: [&str; 2] = ["admin", "v1"];

pub struct HttpAdminClient {
    http: Client,
    base: Url,
    access_key: String,
    secret_key: String,
}

impl HttpAdminClient {
    pub fn new(endpoint: &AdminEndpoint, timeout: Duration) -> Result<Self, AdminError> {
        let base = Url::parse(&endpoint.url)
            .map_err(|e| AdminError::InvalidEndpoint(format!("{}: {}", endpoint.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(AdminError::InvalidEndpoint(endpoint.url.clone()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(HttpAdminClient {
            http,
            base,
            access_key: endpoint.access_key.clone(),
            secret_key: endpoint.secret_key.clone(),
        })
    }

    /// Build `<base>/admin/v1/<segments...>` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, AdminError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AdminError> {
        let response = request
            .basic_auth(&self.access_key, Some(&self.secret_key))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, AdminError> {
        let url = self.url(segments)?;
        debug!("GET {}", url);
        Ok(self.send(self.http.get(url)).await?.json().await?)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, AdminError> {
        let url = self.url(segments)?;
        debug!("POST {}", url);
        Ok(self.send(self.http.post(url).json(body)).await?.json().await?)
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), AdminError> {
        let url = self.url(segments)?;
        debug!("DELETE {}", url);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }
}

fn status_error(status: StatusCode, body: String) -> AdminError {
    match status {
        StatusCode::NOT_FOUND => AdminError::NotFound(body),
        StatusCode::CONFLICT => AdminError::Conflict(body),
        _ => AdminError::Status {
            status: status.as_u16(),
            message: body,
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRequest<'a> {
    name: &'a str,
    policy: &'a IdentityPolicy,
}

#[async_trait]
impl AdminApi for HttpAdminClient {
    #[instrument(skip(self))]
    async fn list_buckets(&self) -> Result<Vec<Bucket>, AdminError> {
        self.get_json(&["buckets"]).await
    }

    #[instrument(skip(self, request), fields(bucket = %request.name))]
    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), AdminError> {
        let url = self.url(&["buckets"])?;
        self.send(self.http.post(url).json(request)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn bucket_info(&self, name: &str) -> Result<BucketDetails, AdminError> {
        self.get_json(&["buckets", name]).await
    }

    #[instrument(skip(self))]
    async fn delete_bucket(&self, name: &str) -> Result<(), AdminError> {
        self.delete(&["buckets", name]).await
    }

    #[instrument(skip(self))]
    async fn get_identity(&self, name: &str) -> Result<Option<Identity>, AdminError> {
        match self.get_json(&["identities", name]).await {
            Ok(identity) => Ok(Some(identity)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, policy))]
    async fn create_identity(
        &self,
        name: &str,
        policy: &IdentityPolicy,
    ) -> Result<AccessKey, AdminError> {
        self.post_json(&["identities"], &IdentityRequest { name, policy })
            .await
    }

    #[instrument(skip(self, policy))]
    async fn update_identity(&self, name: &str, policy: &IdentityPolicy) -> Result<(), AdminError> {
        let url = self.url(&["identities", name])?;
        self.send(self.http.put(url).json(&IdentityRequest { name, policy }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self, name: &str) -> Result<(), AdminError> {
        self.delete(&["identities", name]).await
    }

    #[instrument(skip(self))]
    async fn create_access_key(&self, identity: &str) -> Result<AccessKey, AdminError> {
        self.post_json(&["identities", identity, "keys"], &serde_json::json!({}))
            .await
    }
}

/// Connector producing [`HttpAdminClient`] handles
#[derive(Clone, Debug)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        HttpConnector { timeout }
    }
}

impl AdminConnector for HttpConnector {
    fn connect(&self, endpoint: &AdminEndpoint) -> Result<Arc<dyn AdminApi>, AdminError> {
        Ok(Arc::new(HttpAdminClient::new(endpoint, self.timeout)?))
    }
}
