// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    error::{kube_error_to_api_error, ApiError},
};
use crate::shim_layer::store::ObjectStore;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::Client;

/// ObjectStore backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> KubeStore {
        KubeStore { client }
    }

    fn api(&self, kind: Kind, namespace: Option<&str>) -> Api<DynamicObject> {
        let api_resource = kind.api_resource();
        match namespace {
            Some(namespace) if kind.is_namespaced() => {
                Api::namespaced_with(self.client.clone(), namespace, &api_resource)
            }
            _ => Api::all_with(self.client.clone(), &api_resource),
        }
    }

    fn api_for(&self, obj: &DynamicObject) -> Result<(ObjectRef, Api<DynamicObject>), ApiError> {
        let key = ObjectRef::from_dynamic(obj).ok_or(ApiError::BadRequest)?;
        if key.kind.is_namespaced() && key.namespace.is_none() {
            return Err(ApiError::BadRequest);
        }
        let api = self.api(key.kind, key.namespace.as_deref());
        Ok((key, api))
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, key: &ObjectRef) -> Result<DynamicObject, ApiError> {
        self.api(key.kind, key.namespace.as_deref())
            .get(&key.name)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        let (_, api) = self.api_for(obj)?;
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        let (key, api) = self.api_for(obj)?;
        api.replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn delete(&self, key: &ObjectRef) -> Result<(), ApiError> {
        self.api(key.kind, key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|err| kube_error_to_api_error(&err))
    }
}
