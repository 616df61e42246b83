// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to the storage cluster's administrative endpoint.

pub mod api;
pub mod cache;
pub mod client;

pub use api::{
    AccessKey, AdminApi, AdminConnector, AdminEndpoint, AdminError, Bucket, BucketAction,
    BucketDetails, CreateBucketRequest, Identity, IdentityPolicy, ObjectLockConfig, Retention,
};
pub use cache::{CacheSweeper, ConnectionCache};
pub use client::{HttpAdminClient, HttpConnector};
