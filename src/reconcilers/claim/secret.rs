// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Credential secret issued to bucket claim owners

use crate::admin::AccessKey;
use crate::constants::{labels, secret_keys, OPERATOR_NAME};
use crate::types::claim::BucketInfo;
use crate::types::BucketClaim;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Build the credential secret for a claim: canonical keys plus their aliases
pub fn credential_secret(claim: &BucketClaim, key: &AccessKey, bucket: &BucketInfo) -> Secret {
    let mut data = BTreeMap::new();
    let mut put = |canonical: &str, aliases: &[&str], value: &str| {
        for name in std::iter::once(canonical).chain(aliases.iter().copied()) {
            data.insert(name.to_string(), ByteString(value.as_bytes().to_vec()));
        }
    };

    put(
        secret_keys::ACCESS_KEY_ID,
        secret_keys::ACCESS_KEY_ID_ALIASES,
        &key.access_key_id,
    );
    put(
        secret_keys::SECRET_ACCESS_KEY,
        secret_keys::SECRET_ACCESS_KEY_ALIASES,
        &key.secret_access_key,
    );
    put(secret_keys::ENDPOINT, secret_keys::ENDPOINT_ALIASES, &bucket.endpoint);
    put(secret_keys::REGION, secret_keys::REGION_ALIASES, &bucket.region);
    put(secret_keys::BUCKET, secret_keys::BUCKET_ALIASES, &bucket.name);

    let mut secret_labels = claim.spec.secret.labels.clone();
    secret_labels.insert(labels::MANAGED_BY.to_string(), OPERATOR_NAME.to_string());
    secret_labels.insert(labels::CLAIM.to_string(), claim.name_any());

    let annotations = &claim.spec.secret.annotations;

    Secret {
        metadata: ObjectMeta {
            name: Some(claim.secret_name()),
            namespace: claim.namespace(),
            labels: Some(secret_labels),
            annotations: (!annotations.is_empty()).then(|| annotations.clone()),
            owner_references: claim.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        data: Some(data),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Access key stored in a previously issued secret, if it is complete
pub fn stored_access_key(secret: &Secret) -> Option<AccessKey> {
    let data = secret.data.as_ref()?;
    let read = |key: &str| {
        data.get(key)
            .and_then(|v| String::from_utf8(v.0.clone()).ok())
            .filter(|v| !v.is_empty())
    };

    Some(AccessKey {
        access_key_id: read(secret_keys::ACCESS_KEY_ID)?,
        secret_access_key: read(secret_keys::SECRET_ACCESS_KEY)?,
    })
}

/// Whether the secret was issued for this claim, so cleanup never removes a foreign secret
pub fn is_issued_for(secret: &Secret, claim: &BucketClaim) -> bool {
    secret
        .labels()
        .get(labels::CLAIM)
        .is_some_and(|owner| *owner == claim.name_any())
}
