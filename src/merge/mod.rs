// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create-or-update convergence of live objects toward desired objects.
//!
//! Drift is measured against the payload last applied by the operator, stored as
//! an annotation on the live object, instead of the full live spec: live objects
//! carry server-populated fields that the desired object never mentions.

pub mod kinds;
pub mod three_way;

pub use kinds::Converge;

use crate::constants::{annotations, OPERATOR_NAME};
use crate::error::{Result, StowageError};
use kube::api::PostParams;
use kube::{Api, ResourceExt};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

const ENVELOPE_KEYS: [&str; 4] = ["apiVersion", "kind", "metadata", "status"];

/// Outcome of a convergence call
#[derive(Debug, Clone)]
pub enum Applied<K> {
    Created(K),
    Updated(K),
    Unchanged(K),
}

impl<K> Applied<K> {
    pub fn into_inner(self) -> K {
        match self {
            Applied::Created(obj) | Applied::Updated(obj) | Applied::Unchanged(obj) => obj,
        }
    }

    /// True when a write was issued
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Unchanged(_))
    }
}

/// Converge the live object toward `desired`, issuing at most one write.
///
/// Creation is attempted first. When the object already exists, the live copy
/// is fetched and merged; the update is only sent when the merge changed
/// something. Conflicts and transport errors are returned for the caller to
/// retry on its own schedule.
#[instrument(skip(api, desired), fields(kind = %K::kind(&()), name = %desired.name_any()))]
pub async fn create_or_update<K: Converge>(api: &Api<K>, desired: &K) -> Result<Applied<K>> {
    let name = desired.name_any();
    let params = PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };

    let mut to_create = desired.clone();
    to_create
        .annotations_mut()
        .insert(annotations::LAST_APPLIED.to_string(), snapshot_of(desired)?);

    match api.create(&params, &to_create).await {
        Ok(created) => {
            info!("Created {} {}", K::kind(&()), name);
            return Ok(Applied::Created(created));
        }
        Err(kube::Error::Api(err)) if err.code == 409 && err.reason == "AlreadyExists" => {
            debug!("{} {} already exists, merging", K::kind(&()), name);
        }
        Err(e) => return Err(e.into()),
    }

    let live = api.get(&name).await?;

    match plan_update(&live, desired)? {
        None => {
            debug!("{} {} is up to date", K::kind(&()), name);
            Ok(Applied::Unchanged(live))
        }
        Some(merged) => {
            let updated = api.replace(&name, &params, &merged).await?;
            info!("Updated {} {}", K::kind(&()), name);
            Ok(Applied::Updated(updated))
        }
    }
}

/// Compute the object to write for `live`, or `None` when it already matches `desired`
pub fn plan_update<K: Converge>(live: &K, desired: &K) -> Result<Option<K>> {
    let live_json = serde_json::to_value(live)?;
    let desired_json = serde_json::to_value(desired)?;
    let live_payload = payload(&live_json)?;
    let desired_payload = payload(&desired_json)?;

    let previous = live
        .annotations()
        .get(annotations::LAST_APPLIED)
        .and_then(|raw| match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Ignoring unreadable last-applied snapshot on {} {}: {}",
                    K::kind(&()),
                    live.name_any(),
                    e
                );
                None
            }
        });
    let snapshot_changed = previous.as_ref() != Some(&desired_payload);

    let mut merged_payload = three_way::three_way(&live_payload, &desired_payload, previous.as_ref());
    K::preserve_live_fields(&live_payload, &mut merged_payload);

    let mut metadata = live.meta().clone();
    if let Some(labels) = &desired.meta().labels {
        metadata
            .labels
            .get_or_insert_with(Default::default)
            .extend(labels.clone());
    }
    let live_annotations = metadata.annotations.get_or_insert_with(Default::default);
    live_annotations.extend(desired.annotations().clone());
    live_annotations.insert(
        annotations::LAST_APPLIED.to_string(),
        serde_json::to_string(&desired_payload)?,
    );
    if desired.meta().owner_references.is_some() {
        metadata.owner_references = desired.meta().owner_references.clone();
    }

    let metadata_changed = metadata.labels != live.meta().labels
        || metadata.annotations != live.meta().annotations
        || metadata.owner_references != live.meta().owner_references;

    if !snapshot_changed && !metadata_changed && merged_payload == live_payload {
        return Ok(None);
    }

    let Value::Object(merged_fields) = merged_payload else {
        return Err(StowageError::MergeError(format!(
            "merged payload of {} {} is not an object",
            K::kind(&()),
            live.name_any()
        )));
    };

    let mut object: Map<String, Value> = live_json
        .as_object()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|(key, _)| ENVELOPE_KEYS.contains(&key.as_str()) && key != "metadata")
        .collect();
    object.insert("metadata".to_string(), serde_json::to_value(&metadata)?);
    object.extend(merged_fields);

    serde_json::from_value(Value::Object(object)).map(Some).map_err(|e| {
        StowageError::MergeError(format!(
            "merged {} {} does not deserialize: {}",
            K::kind(&()),
            live.name_any(),
            e
        ))
    })
}

/// Serialized payload stored as the last-applied snapshot
pub fn snapshot_of<K: Converge>(obj: &K) -> Result<String> {
    let json = serde_json::to_value(obj)?;
    Ok(serde_json::to_string(&payload(&json)?)?)
}

/// Everything but the object envelope
fn payload(obj: &Value) -> Result<Value> {
    let fields = obj
        .as_object()
        .ok_or_else(|| StowageError::MergeError("object is not a JSON map".to_string()))?;

    Ok(Value::Object(
        fields
            .iter()
            .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    ))
}
