// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a recording mock of the Kubernetes API and an in-memory admin endpoint.

use crate::admin::{
    AccessKey, AdminApi, AdminConnector, AdminEndpoint, AdminError, Bucket, BucketDetails,
    CreateBucketRequest, Identity, IdentityPolicy,
};
use async_trait::async_trait;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request seen by the mock API server
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

/// A mock HTTP service that returns predefined responses based on request paths
/// and records every request it receives. Clones share state.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register (or replace) the response for a method and path
    pub fn set(&self, method: &str, path: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
    }

    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.set("GET", path, status, body);
        self
    }

    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.set("POST", path, status, body);
        self
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.set("PUT", path, status, body);
        self
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.set("PATCH", path, status, body);
        self
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.set("DELETE", path, status, body);
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests with the given method whose path starts with `prefix`
    pub fn count(&self, method: &str, prefix: &str) -> usize {
        self.matching(method, prefix).len()
    }

    /// JSON bodies of requests with the given method whose path starts with `prefix`
    pub fn bodies(&self, method: &str, prefix: &str) -> Vec<Value> {
        self.matching(method, prefix)
            .into_iter()
            .filter_map(|r| r.body)
            .collect()
    }

    fn matching(&self, method: &str, prefix: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        // Try exact match first
        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Longest registered prefix wins, e.g. /.../bucketclaims/x also answers /.../bucketclaims/x/status
        responses
            .iter()
            .filter(|((m, p), _)| m == method && path.starts_with(p.as_str()))
            .max_by_key(|((_, p), _)| p.len())
            .map(|(_, resp)| resp.clone())
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            let body = serde_json::from_slice(&bytes).ok();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                body,
            });

            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("object", "unknown")));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

fn status_json(code: u16, reason: &str, message: String) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", format!("{} \"{}\" not found", resource, name))
}

/// Create a 409 response for a create of an existing object
pub fn already_exists_json(resource: &str, name: &str) -> String {
    status_json(409, "AlreadyExists", format!("{} \"{}\" already exists", resource, name))
}

/// Create a 409 response for a stale resourceVersion
pub fn conflict_json(resource: &str, name: &str) -> String {
    status_json(
        409,
        "Conflict",
        format!(
            "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
            resource, name
        ),
    )
}

/// A call received by [`FakeAdmin`]
#[derive(Clone, Debug, PartialEq)]
pub enum AdminCall {
    ListBuckets,
    CreateBucket(CreateBucketRequest),
    BucketInfo(String),
    DeleteBucket(String),
    GetIdentity(String),
    CreateIdentity(String, IdentityPolicy),
    UpdateIdentity(String, IdentityPolicy),
    DeleteIdentity(String),
    CreateAccessKey(String),
}

#[derive(Default)]
struct FakeState {
    buckets: BTreeMap<String, BucketDetails>,
    identities: BTreeMap<String, Identity>,
    keys_issued: u32,
    failing: HashSet<&'static str>,
}

/// In-memory admin endpoint recording every call
#[derive(Default)]
pub struct FakeAdmin {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<AdminCall>>,
}

impl FakeAdmin {
    pub fn calls(&self) -> Vec<AdminCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&AdminCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make the named operation (e.g. `"delete_bucket"`) fail with a 500
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn add_bucket(&self, name: &str) {
        self.state.lock().unwrap().buckets.insert(
            name.to_string(),
            BucketDetails {
                name: name.to_string(),
                creation_date: Some("2026-01-01T00:00:00Z".to_string()),
                ..Default::default()
            },
        );
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.state.lock().unwrap().buckets.contains_key(name)
    }

    pub fn identity(&self, name: &str) -> Option<Identity> {
        self.state.lock().unwrap().identities.get(name).cloned()
    }

    fn record(&self, call: AdminCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str) -> Result<(), AdminError> {
        if self.state.lock().unwrap().failing.contains(op) {
            return Err(AdminError::Status {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn issue_key(state: &mut FakeState, identity: &str) -> AccessKey {
        state.keys_issued += 1;
        let key = AccessKey {
            access_key_id: format!("AK{}", state.keys_issued),
            secret_access_key: format!("SK{}", state.keys_issued),
        };
        if let Some(identity) = state.identities.get_mut(identity) {
            identity.access_keys.push(key.access_key_id.clone());
        }
        key
    }
}

#[async_trait]
impl AdminApi for FakeAdmin {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, AdminError> {
        self.record(AdminCall::ListBuckets);
        self.check("list_buckets")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .buckets
            .values()
            .map(|b| Bucket {
                name: b.name.clone(),
                creation_date: b.creation_date.clone(),
            })
            .collect())
    }

    async fn create_bucket(&self, request: &CreateBucketRequest) -> Result<(), AdminError> {
        self.record(AdminCall::CreateBucket(request.clone()));
        self.check("create_bucket")?;
        let mut state = self.state.lock().unwrap();
        if state.buckets.contains_key(&request.name) {
            return Err(AdminError::Conflict(request.name.clone()));
        }
        state.buckets.insert(
            request.name.clone(),
            BucketDetails {
                name: request.name.clone(),
                versioning: request.versioning,
                object_lock: request.object_lock.is_some(),
                quota_bytes: request.quota_bytes,
                creation_date: Some("2026-01-01T00:00:00Z".to_string()),
            },
        );
        Ok(())
    }

    async fn bucket_info(&self, name: &str) -> Result<BucketDetails, AdminError> {
        self.record(AdminCall::BucketInfo(name.to_string()));
        self.check("bucket_info")?;
        self.state
            .lock()
            .unwrap()
            .buckets
            .get(name)
            .cloned()
            .ok_or_else(|| AdminError::NotFound(name.to_string()))
    }

    async fn delete_bucket(&self, name: &str) -> Result<(), AdminError> {
        self.record(AdminCall::DeleteBucket(name.to_string()));
        self.check("delete_bucket")?;
        self.state
            .lock()
            .unwrap()
            .buckets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdminError::NotFound(name.to_string()))
    }

    async fn get_identity(&self, name: &str) -> Result<Option<Identity>, AdminError> {
        self.record(AdminCall::GetIdentity(name.to_string()));
        self.check("get_identity")?;
        Ok(self.identity(name))
    }

    async fn create_identity(
        &self,
        name: &str,
        policy: &IdentityPolicy,
    ) -> Result<AccessKey, AdminError> {
        self.record(AdminCall::CreateIdentity(name.to_string(), policy.clone()));
        self.check("create_identity")?;
        let mut state = self.state.lock().unwrap();
        if state.identities.contains_key(name) {
            return Err(AdminError::Conflict(name.to_string()));
        }
        state.identities.insert(
            name.to_string(),
            Identity {
                name: name.to_string(),
                access_keys: vec![],
                policy: policy.clone(),
            },
        );
        Ok(Self::issue_key(&mut state, name))
    }

    async fn update_identity(&self, name: &str, policy: &IdentityPolicy) -> Result<(), AdminError> {
        self.record(AdminCall::UpdateIdentity(name.to_string(), policy.clone()));
        self.check("update_identity")?;
        let mut state = self.state.lock().unwrap();
        let identity = state
            .identities
            .get_mut(name)
            .ok_or_else(|| AdminError::NotFound(name.to_string()))?;
        identity.policy = policy.clone();
        Ok(())
    }

    async fn delete_identity(&self, name: &str) -> Result<(), AdminError> {
        self.record(AdminCall::DeleteIdentity(name.to_string()));
        self.check("delete_identity")?;
        self.state
            .lock()
            .unwrap()
            .identities
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdminError::NotFound(name.to_string()))
    }

    async fn create_access_key(&self, identity: &str) -> Result<AccessKey, AdminError> {
        self.record(AdminCall::CreateAccessKey(identity.to_string()));
        self.check("create_access_key")?;
        let mut state = self.state.lock().unwrap();
        if !state.identities.contains_key(identity) {
            return Err(AdminError::NotFound(identity.to_string()));
        }
        Ok(Self::issue_key(&mut state, identity))
    }
}

/// Connector handing out one shared [`FakeAdmin`]
#[derive(Default)]
pub struct FakeConnector {
    pub admin: Arc<FakeAdmin>,
    connects: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl AdminConnector for FakeConnector {
    fn connect(&self, endpoint: &AdminEndpoint) -> Result<Arc<dyn AdminApi>, AdminError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AdminError::InvalidEndpoint(endpoint.url.clone()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.admin.clone())
    }
}
