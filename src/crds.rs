// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PULL_ALWAYS: &str = "Always";
pub const PULL_NEVER: &str = "Never";
pub const PULL_IF_NOT_PRESENT: &str = "IfNotPresent";

/// RadeonInstanceSpec defines the desired state of a RadeonInstance.
#[derive(
    CustomResource, Default, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq,
)]
#[kube(group = "cache.amd.com", version = "v1alpha1", kind = "RadeonInstance")]
#[kube(shortname = "ri", namespaced)]
pub struct RadeonInstanceSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(regex(pattern = r"[a-zA-Z0-9\.\-\/]+"))]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(regex(pattern = r"[a-zA-Z0-9\-]+"))]
    pub image: String,
    #[serde(rename = "imagePullPolicy", default, skip_serializing_if = "String::is_empty")]
    pub image_pull_policy: String,
}

impl RadeonInstanceSpec {
    /// The full image reference for the device plugin container.
    pub fn image_path(&self) -> &str {
        &self.image
    }

    /// Normalizes the free-form pull policy; anything unrecognized means IfNotPresent.
    pub fn image_policy(&self) -> &'static str {
        match self.image_pull_policy.as_str() {
            PULL_ALWAYS => PULL_ALWAYS,
            PULL_NEVER => PULL_NEVER,
            _ => PULL_IF_NOT_PRESENT,
        }
    }
}
