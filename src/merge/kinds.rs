// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kind-specific knowledge for the merge engine: which fields the live system owns.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// A resource the merge engine can converge
pub trait Converge:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// Copy fields owned by the live system from `live` into `merged`.
    /// Both arguments are payloads: the object without `apiVersion`, `kind`,
    /// `metadata` and `status`.
    fn preserve_live_fields(_live: &Value, _merged: &mut Value) {}
}

/// Overwrite the field at `pointer` in `merged` with the live value, if live has one
fn keep_live(live: &Value, merged: &mut Value, pointer: &str) {
    let Some(value) = live.pointer(pointer) else {
        return;
    };
    let Some((parent, field)) = pointer.rsplit_once('/') else {
        return;
    };
    if let Some(Value::Object(obj)) = merged.pointer_mut(parent) {
        obj.insert(field.to_string(), value.clone());
    }
}

impl Converge for Service {
    fn preserve_live_fields(live: &Value, merged: &mut Value) {
        keep_live(live, merged, "/spec/clusterIP");
        keep_live(live, merged, "/spec/clusterIPs");
        keep_live(live, merged, "/spec/healthCheckNodePort");

        // Allocated node ports stay stable; ports match by name, then by port number
        let Some(live_ports) = live.pointer("/spec/ports").and_then(Value::as_array) else {
            return;
        };
        let Some(merged_ports) = merged.pointer_mut("/spec/ports").and_then(Value::as_array_mut)
        else {
            return;
        };
        for port in merged_ports.iter_mut() {
            let live_port = live_ports.iter().find(|lp| match port.get("name") {
                Some(name) => lp.get("name") == Some(name),
                None => lp.get("port") == port.get("port"),
            });
            let node_port = live_port.and_then(|lp| lp.get("nodePort")).cloned();
            if let (Some(node_port), Some(obj)) = (node_port, port.as_object_mut()) {
                obj.insert("nodePort".to_string(), node_port);
            }
        }
    }
}

impl Converge for StatefulSet {
    fn preserve_live_fields(live: &Value, merged: &mut Value) {
        // Immutable once created
        keep_live(live, merged, "/spec/selector");
        keep_live(live, merged, "/spec/serviceName");
        keep_live(live, merged, "/spec/volumeClaimTemplates");
        keep_live(live, merged, "/spec/podManagementPolicy");
    }
}

impl Converge for Deployment {
    fn preserve_live_fields(live: &Value, merged: &mut Value) {
        keep_live(live, merged, "/spec/selector");
    }
}

impl Converge for ConfigMap {}

impl Converge for Secret {}
