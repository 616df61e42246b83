// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bucket and credential provisioning for an active claim

use super::{secret, status, ClaimReconciler};
use crate::admin::{
    AccessKey, AdminApi, AdminEndpoint, AdminError, CreateBucketRequest, IdentityPolicy,
    ObjectLockConfig, Retention,
};
use crate::constants::cluster_credentials;
use crate::error::{AdminContext, Result, StowageError};
use crate::merge::create_or_update;
use crate::types::claim::{BucketClaimSpec, BucketInfo, ObjectLockMode, Quota, SecretInfo};
use crate::types::{BucketClaim, BucketClaimStatus, ClaimPhase, StorageCluster};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, instrument};

/// Everything a successful pass hands to the status
#[derive(Debug)]
pub struct Provisioned {
    pub bucket: BucketInfo,
    pub secret: Option<SecretInfo>,
}

/// Look up the referenced cluster and the admin endpoint with its root credentials
#[instrument(skip_all, fields(cluster = %claim.spec.cluster_ref.name))]
pub async fn resolve_endpoint(
    client: &Client,
    claim: &BucketClaim,
) -> Result<(StorageCluster, AdminEndpoint)> {
    let namespace = claim.cluster_namespace();
    let cluster_name = &claim.spec.cluster_ref.name;

    let clusters: Api<StorageCluster> = Api::namespaced(client.clone(), &namespace);
    let cluster = clusters
        .get_opt(cluster_name)
        .await?
        .ok_or_else(|| StowageError::ClusterNotFound(format!("{}/{}", namespace, cluster_name)))?;

    let secret_name = &cluster.spec.credentials_secret;
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let credentials = secrets.get_opt(secret_name).await?.ok_or_else(|| {
        StowageError::MissingCredentials(format!("secret {}/{} not found", namespace, secret_name))
    })?;

    let read = |key: &str| {
        credentials
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(|value| String::from_utf8(value.0.clone()).ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                StowageError::MissingCredentials(format!(
                    "secret {}/{} has no {}",
                    namespace, secret_name, key
                ))
            })
    };

    let endpoint = AdminEndpoint {
        url: cluster.admin_endpoint(),
        region: cluster.region(),
        access_key: read(cluster_credentials::ACCESS_KEY)?,
        secret_key: read(cluster_credentials::SECRET_KEY)?,
    };

    Ok((cluster, endpoint))
}

/// Converge the bucket, identity and secret of an active claim.
///
/// `current` tracks the status in effect; it is updated when the claim moves
/// from `Pending` to `Creating`.
#[instrument(skip_all, fields(claim = %claim.name_any(), bucket = %claim.bucket_name()))]
pub async fn provision(
    ctx: &ClaimReconciler,
    claims: &Api<BucketClaim>,
    claim: &BucketClaim,
    current: &mut Option<BucketClaimStatus>,
) -> Result<Provisioned> {
    let (cluster, endpoint) = resolve_endpoint(&ctx.client, claim).await?;
    if !cluster.is_ready() {
        return Err(StowageError::ClusterNotReady(cluster.name_any()));
    }

    let phase = current.as_ref().map(|s| s.phase).unwrap_or_default();
    if phase == ClaimPhase::Pending {
        let creating = status::creating(current.as_ref());
        *current = Some(status::write_status(claims, claim, current.as_ref(), creating).await?);
    }

    let admin = ctx
        .cache
        .get(&endpoint)
        .await
        .during(format!("connect to {}", endpoint.url))?;

    let bucket = ensure_bucket(admin.as_ref(), claim, &cluster).await?;

    let secret = if claim.spec.secret.enabled {
        Some(ensure_credentials(&ctx.client, admin.as_ref(), claim, &bucket).await?)
    } else {
        debug!("Secret disabled for {}, skipping credentials", claim.name_any());
        None
    };

    Ok(Provisioned { bucket, secret })
}

async fn ensure_bucket(
    admin: &dyn AdminApi,
    claim: &BucketClaim,
    cluster: &StorageCluster,
) -> Result<BucketInfo> {
    let name = claim.bucket_name();

    let listed = admin
        .list_buckets()
        .await
        .during("list buckets")?
        .into_iter()
        .find(|b| b.name == name);

    let listed_date = match listed {
        Some(bucket) => {
            debug!("Bucket {} already exists", name);
            bucket.creation_date
        }
        None => {
            let request = bucket_request(&claim.spec, &name)?;
            admin
                .create_bucket(&request)
                .await
                .during(format!("create bucket {}", name))?;
            info!("Created bucket {}", name);
            None
        }
    };

    let details = admin
        .bucket_info(&name)
        .await
        .during(format!("read bucket {}", name))?;

    Ok(BucketInfo {
        name,
        endpoint: cluster.s3_endpoint(),
        region: cluster.region(),
        versioning: details.versioning,
        object_lock: details.object_lock,
        quota_bytes: details.quota_bytes,
        creation_date: details.creation_date.or(listed_date),
    })
}

/// Translate the claim spec into a bucket creation request
pub fn bucket_request(spec: &BucketClaimSpec, name: &str) -> Result<CreateBucketRequest> {
    let quota_bytes = match &spec.quota {
        Some(quota) if quota.enabled => Some(quota_bytes(quota)?),
        _ => None,
    };

    let object_lock = match &spec.object_lock {
        Some(lock) if lock.enabled => {
            let mode = match lock.mode.unwrap_or(ObjectLockMode::Governance) {
                ObjectLockMode::Governance => "GOVERNANCE",
                ObjectLockMode::Compliance => "COMPLIANCE",
            };
            Some(ObjectLockConfig {
                mode: mode.to_string(),
                retention: lock.duration.as_deref().map(parse_retention).transpose()?,
            })
        }
        _ => None,
    };

    Ok(CreateBucketRequest {
        name: name.to_string(),
        // Object lock cannot be enabled on an unversioned bucket
        versioning: spec.versioning_enabled || object_lock.is_some(),
        object_lock,
        quota_bytes,
    })
}

/// Quota size in bytes; units are binary (`GB` is 1024^3)
pub fn quota_bytes(quota: &Quota) -> Result<u64> {
    let exponent = match quota.unit.trim() {
        "B" | "" => 0,
        "KB" | "KiB" | "Ki" => 1,
        "MB" | "MiB" | "Mi" => 2,
        "GB" | "GiB" | "Gi" => 3,
        "TB" | "TiB" | "Ti" => 4,
        "PB" | "PiB" | "Pi" => 5,
        other => {
            return Err(StowageError::InvalidSpec(format!(
                "unknown quota unit '{}'",
                other
            )))
        }
    };

    quota
        .size
        .checked_mul(1024u64.pow(exponent))
        .ok_or_else(|| {
            StowageError::InvalidSpec(format!("quota {}{} overflows", quota.size, quota.unit))
        })
}

/// Parse an object lock retention such as `30d` or `1y`
pub fn parse_retention(duration: &str) -> Result<Retention> {
    let invalid = || {
        StowageError::InvalidSpec(format!(
            "object lock duration '{}' must look like 30d or 1y",
            duration
        ))
    };

    let trimmed = duration.trim();
    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let amount: u32 = trimmed[..trimmed.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    match unit {
        'd' | 'D' => Ok(Retention::Days(amount)),
        'y' | 'Y' => Ok(Retention::Years(amount)),
        _ => Err(invalid()),
    }
}

/// Ensure the claim's identity exists with a bucket-scoped policy and that its
/// key is stored in the credential secret.
async fn ensure_credentials(
    client: &Client,
    admin: &dyn AdminApi,
    claim: &BucketClaim,
    bucket: &BucketInfo,
) -> Result<SecretInfo> {
    let identity = claim.identity_name();
    let policy = IdentityPolicy::bucket_scoped(&bucket.name);
    let secrets: Api<Secret> = Api::namespaced(
        client.clone(),
        &claim.namespace().unwrap_or_else(|| "default".to_string()),
    );

    let existing = secrets.get_opt(&claim.secret_name()).await?;
    if existing
        .as_ref()
        .is_some_and(|s| !secret::is_issued_for(s, claim))
    {
        return Err(StowageError::InvalidSpec(format!(
            "secret {} exists and is not managed by this claim",
            claim.secret_name()
        )));
    }
    let stored = existing.as_ref().and_then(secret::stored_access_key);

    let key = match admin
        .get_identity(&identity)
        .await
        .during(format!("read identity {}", identity))?
    {
        Some(existing) => {
            if existing.policy != policy {
                admin
                    .update_identity(&identity, &policy)
                    .await
                    .during(format!("update identity {}", identity))?;
                info!("Updated policy of identity {}", identity);
            }
            match stored.filter(|k| existing.access_keys.contains(&k.access_key_id)) {
                Some(key) => key,
                None => mint_key(admin, &identity).await?,
            }
        }
        None => {
            let key = match admin.create_identity(&identity, &policy).await {
                // Created concurrently since the lookup
                Err(AdminError::Conflict(_)) => admin.create_access_key(&identity).await,
                other => other,
            }
            .during(format!("create identity {}", identity))?;
            info!("Created identity {}", identity);
            key
        }
    };

    let desired = secret::credential_secret(claim, &key, bucket);
    create_or_update(&secrets, &desired).await?;

    Ok(SecretInfo {
        name: claim.secret_name(),
        access_key_id: key.access_key_id,
        identity,
    })
}

async fn mint_key(admin: &dyn AdminApi, identity: &str) -> Result<AccessKey> {
    let key = admin
        .create_access_key(identity)
        .await
        .during(format!("create access key for {}", identity))?;
    info!("Issued access key {} for {}", key.access_key_id, identity);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::claim::{ClusterRef, DeletionPolicy, ObjectLock, SecretConfig};

    fn spec() -> BucketClaimSpec {
        BucketClaimSpec {
            bucket_name: "reports".to_string(),
            cluster_ref: ClusterRef {
                name: "main".to_string(),
                namespace: None,
            },
            quota: None,
            versioning_enabled: false,
            object_lock: None,
            secret: SecretConfig::default(),
            deletion_policy: DeletionPolicy::Delete,
        }
    }

    fn quota(size: u64, unit: &str) -> Quota {
        Quota {
            size,
            unit: unit.to_string(),
            enabled: true,
        }
    }

    #[test]
    fn test_quota_units_are_binary() {
        assert_eq!(quota_bytes(&quota(5, "GB")).unwrap(), 5_368_709_120);
        assert_eq!(quota_bytes(&quota(5, "Gi")).unwrap(), 5_368_709_120);
        assert_eq!(quota_bytes(&quota(2, "KiB")).unwrap(), 2048);
        assert_eq!(quota_bytes(&quota(7, "B")).unwrap(), 7);
        assert_eq!(quota_bytes(&quota(1, "PB")).unwrap(), 1u64 << 50);
    }

    #[test]
    fn test_quota_rejects_unknown_unit_and_overflow() {
        assert!(matches!(
            quota_bytes(&quota(1, "XB")),
            Err(StowageError::InvalidSpec(_))
        ));
        assert!(matches!(
            quota_bytes(&quota(u64::MAX, "KB")),
            Err(StowageError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_disabled_quota_is_ignored() {
        let mut spec = spec();
        spec.quota = Some(Quota {
            enabled: false,
            ..quota(5, "GB")
        });

        assert_eq!(bucket_request(&spec, "reports").unwrap().quota_bytes, None);
    }

    #[test]
    fn test_object_lock_forces_versioning() {
        let mut spec = spec();
        spec.object_lock = Some(ObjectLock {
            enabled: true,
            mode: None,
            duration: Some("30d".to_string()),
        });

        let request = bucket_request(&spec, "reports").unwrap();
        assert!(request.versioning);
        let lock = request.object_lock.unwrap();
        assert_eq!(lock.mode, "GOVERNANCE");
        assert_eq!(lock.retention, Some(Retention::Days(30)));
    }

    #[test]
    fn test_disabled_object_lock_leaves_versioning_alone() {
        let mut spec = spec();
        spec.object_lock = Some(ObjectLock {
            enabled: false,
            mode: Some(ObjectLockMode::Compliance),
            duration: None,
        });

        let request = bucket_request(&spec, "reports").unwrap();
        assert!(!request.versioning);
        assert!(request.object_lock.is_none());
    }

    #[test]
    fn test_parse_retention() {
        assert_eq!(parse_retention("1y").unwrap(), Retention::Years(1));
        assert_eq!(parse_retention(" 90d ").unwrap(), Retention::Days(90));
        assert!(parse_retention("0d").is_err());
        assert!(parse_retention("30w").is_err());
        assert!(parse_retention("d").is_err());
        assert!(parse_retention("").is_err());
        assert!(parse_retention("3é").is_err());
    }
}
