// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group shared by the Stowage CRDs
pub const API_GROUP: &str = "stowage.io";

/// The operator name used as field manager and in managed-by labels
pub const OPERATOR_NAME: &str = "stowage";

/// Kubernetes annotation keys used by Stowage
pub mod annotations {
    /// Serialized payload of the last applied desired object
    pub const LAST_APPLIED: &str = "stowage.io/last-applied";
}

/// Label keys stamped on objects the operator owns
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const CLAIM: &str = "stowage.io/claim";
}

/// Finalizer guarding bucket and credential cleanup
pub const CLAIM_FINALIZER: &str = "stowage.io/bucket-cleanup";

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Requeue delays per claim phase, in seconds
pub mod requeue {
    pub const PENDING_SECS: u64 = 5;
    pub const CREATING_SECS: u64 = 10;
    pub const READY_SECS: u64 = 300;
    pub const FAILED_SECS: u64 = 60;
    /// Upper bound of the positive jitter, as a fraction of the base delay
    pub const JITTER_FRACTION: f64 = 0.1;
    /// Storage cluster re-check once all replicas are ready
    pub const CLUSTER_READY_SECS: u64 = 300;
    /// Storage cluster re-check while replicas are still coming up
    pub const CLUSTER_PROGRESSING_SECS: u64 = 15;
    /// Retry delay after a failed reconciliation
    pub const ERROR_SECS: u64 = 60;
}

/// Connection cache defaults
pub mod cache {
    pub const IDLE_TTL_SECS: u64 = 300;
    pub const SWEEP_INTERVAL_SECS: u64 = 60;
}

/// Keys written into a claim's credential secret
pub mod secret_keys {
    pub const ACCESS_KEY_ID: &str = "access-key-id";
    pub const SECRET_ACCESS_KEY: &str = "secret-access-key";
    pub const ENDPOINT: &str = "endpoint";
    pub const REGION: &str = "region";
    pub const BUCKET: &str = "bucket";

    /// Aliases for clients following AWS SDK or generic S3 conventions
    pub const ACCESS_KEY_ID_ALIASES: &[&str] = &["AWS_ACCESS_KEY_ID"];
    pub const SECRET_ACCESS_KEY_ALIASES: &[&str] = &["AWS_SECRET_ACCESS_KEY"];
    pub const ENDPOINT_ALIASES: &[&str] = &["AWS_ENDPOINT_URL", "S3_ENDPOINT"];
    pub const REGION_ALIASES: &[&str] = &["AWS_REGION", "AWS_DEFAULT_REGION", "S3_REGION"];
    pub const BUCKET_ALIASES: &[&str] = &["S3_BUCKET", "BUCKET_NAME"];
}

/// Keys expected in a cluster's root credentials secret
pub mod cluster_credentials {
    pub const ACCESS_KEY: &str = "accesskey";
    pub const SECRET_KEY: &str = "secretkey";
}

/// Default ports and region of a storage cluster
pub mod defaults {
    pub const S3_PORT: i32 = 9000;
    pub const ADMIN_PORT: i32 = 9001;
    pub const REGION: &str = "us-east-1";
}
