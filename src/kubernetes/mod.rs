// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and finalizer handling.

pub mod crd;
pub mod finalizer;

pub use crd::{crd_manifests, wait_for_crds};
pub use finalizer::{add_finalizer, remove_finalizer};
