// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finalizer management via JSON merge patches

use crate::error::Result;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::{debug, info, instrument};

/// Add `finalizer` to the object, persisting it before returning
#[instrument(skip(api, obj), fields(name = %obj.name_any()))]
pub async fn add_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let mut finalizers = obj.finalizers().to_vec();
    finalizers.push(finalizer.to_string());

    info!("Adding finalizer {} to {}", finalizer, obj.name_any());
    let patch = json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": obj.resource_version(),
        }
    });
    Ok(api
        .patch(&obj.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}

/// Remove `finalizer` from the object; an object that is already gone counts as done
#[instrument(skip(api, obj), fields(name = %obj.name_any()))]
pub async fn remove_finalizer<K>(api: &Api<K>, obj: &K, finalizer: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let finalizers: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| *f != finalizer)
        .cloned()
        .collect();

    info!("Removing finalizer {} from {}", finalizer, obj.name_any());
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    match api
        .patch(&obj.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => {
            debug!("{} already deleted", obj.name_any());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
