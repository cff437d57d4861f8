// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod config;
pub mod controller;
pub mod crds;
pub mod executable_model;
pub mod kubernetes_api_objects;
pub mod reconciler;
pub mod shim_layer;
#[cfg(test)]
pub mod unit_tests;

use crate::kubernetes_api_objects::{common::ObjectRef, error::ApiError};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),

    #[error("Failed to get {key}: {source}")]
    GetFailed {
        key: ObjectRef,
        #[source]
        source: ApiError,
    },
    #[error("Failed to create {key}: {source}")]
    CreateFailed {
        key: ObjectRef,
        #[source]
        source: ApiError,
    },
    #[error("Failed to update {key}: {source}")]
    UpdateFailed {
        key: ObjectRef,
        #[source]
        source: ApiError,
    },
    #[error("Failed to delete {key}: {source}")]
    DeleteFailed {
        key: ObjectRef,
        #[source]
        source: ApiError,
    },

    #[error("ResourceNotReady: {control} in stage {stage}")]
    ResourceNotReady { stage: usize, control: String },
    #[error("Convergence engine has no stage left to step")]
    EngineFinished,
    #[error("Stage {stage} has no descriptor at slot {slot}")]
    MissingDescriptor { stage: usize, slot: usize },
    #[error("Invalid resource descriptor {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("Failed to marshal object: {0}")]
    MarshalFailed(#[source] serde_json::Error),
    #[error("Failed to read asset {path}: {source}")]
    AssetReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse asset {path}: {source}")]
    AssetParseFailed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Unsupported resource {api_version}/{kind} in {path}")]
    UnsupportedKind {
        path: PathBuf,
        api_version: String,
        kind: String,
    },
}
