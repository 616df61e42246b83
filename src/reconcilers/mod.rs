// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod claim;
pub mod cluster;

pub use claim::ClaimReconciler;
pub use cluster::ClusterReconciler;
