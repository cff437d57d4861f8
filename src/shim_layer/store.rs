// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::{common::ObjectRef, error::ApiError};
use async_trait::async_trait;
use kube::api::DynamicObject;

/// The backing store the control functions converge against.
///
/// Objects travel as DynamicObjects so one store serves every managed kind.
/// `create` and `update` derive the target key from the object's type meta,
/// name and namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectRef) -> Result<DynamicObject, ApiError>;

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError>;

    /// Replaces the stored object. A resourceVersion on `obj` makes the
    /// update conditional on it.
    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError>;

    async fn delete(&self, key: &ObjectRef) -> Result<(), ApiError>;
}
