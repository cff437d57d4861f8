// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::api_server_state::{ApiMethod, ApiServerState, RequestRecord};
use crate::executable_model::fault_injection::{injected_error, Fault};
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    error::ApiError,
};
use crate::shim_layer::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ApiServer is an in-memory version of the Kubernetes API server.
// It keeps the parts of the API server semantics the controller relies on:
// resource versions and uids, admission checks on create and update,
// optimistic concurrency, finalizers with deletion timestamps, and
// ownerReference-based garbage collection.
// It is used by the unit tests and by the render command.
pub struct ApiServer {
    state: Mutex<ApiServerState>,
}

impl Default for ApiServer {
    fn default() -> Self {
        ApiServer::new()
    }
}

impl ApiServer {
    pub fn new() -> ApiServer {
        ApiServer {
            state: Mutex::new(ApiServerState::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ApiServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every later request matching `method` and `kind` fail with `error`.
    pub fn inject_fault(&self, method: ApiMethod, kind: Kind, error: ApiError) {
        self.lock().faults.push(Fault { method, kind, error });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn requests(&self) -> Vec<RequestRecord> {
        self.lock().requests.clone()
    }

    /// Requests that could have changed the stored state.
    pub fn writes(&self) -> Vec<RequestRecord> {
        self.lock()
            .requests
            .iter()
            .filter(|req| req.method.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    pub fn object(&self, key: &ObjectRef) -> Option<DynamicObject> {
        self.lock().resources.get(key).cloned()
    }

    pub fn objects(&self) -> Vec<DynamicObject> {
        self.lock().resources.values().cloned().collect()
    }

    fn admit(s: &mut ApiServerState, method: ApiMethod, key: &ObjectRef) -> Result<(), ApiError> {
        s.requests.push(RequestRecord {
            method,
            key: key.clone(),
        });
        match injected_error(&s.faults, method, key.kind) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn request_key(obj: &DynamicObject) -> Result<ObjectRef, ApiError> {
        if obj.metadata.name.is_none() {
            return Err(ApiError::Invalid);
        }
        let key = ObjectRef::from_dynamic(obj).ok_or(ApiError::BadRequest)?;
        if key.kind.is_namespaced() && key.namespace.is_none() {
            return Err(ApiError::BadRequest);
        }
        Ok(key)
    }

    pub fn handle_get_request(s: &mut ApiServerState, key: &ObjectRef) -> Result<DynamicObject, ApiError> {
        Self::admit(s, ApiMethod::Get, key)?;
        s.resources.get(key).cloned().ok_or(ApiError::ObjectNotFound)
    }

    pub fn handle_create_request(s: &mut ApiServerState, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        let key = Self::request_key(obj)?;
        Self::admit(s, ApiMethod::Create, &key)?;
        if s.resources.contains_key(&key) {
            return Err(ApiError::ObjectAlreadyExists);
        }
        let mut created_obj = obj.clone();
        created_obj.metadata.namespace = key.namespace.clone();
        created_obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        created_obj.metadata.uid = Some(s.uid_counter.to_string());
        created_obj.metadata.deletion_timestamp = None;
        s.resources.insert(key, created_obj.clone());
        s.uid_counter += 1;
        s.resource_version_counter += 1;
        Ok(created_obj)
    }

    pub fn handle_update_request(s: &mut ApiServerState, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        let key = Self::request_key(obj)?;
        Self::admit(s, ApiMethod::Update, &key)?;
        let old_obj = s.resources.get(&key).cloned().ok_or(ApiError::ObjectNotFound)?;
        if obj.metadata.resource_version.is_some()
            && obj.metadata.resource_version != old_obj.metadata.resource_version
        {
            return Err(ApiError::Conflict);
        }
        if obj.metadata.uid.is_some() && obj.metadata.uid != old_obj.metadata.uid {
            return Err(ApiError::InternalError);
        }

        let mut updated_obj = obj.clone();
        updated_obj.metadata.namespace = key.namespace.clone();
        updated_obj.metadata.resource_version = old_obj.metadata.resource_version.clone();
        updated_obj.metadata.uid = old_obj.metadata.uid.clone();
        updated_obj.metadata.deletion_timestamp = old_obj.metadata.deletion_timestamp.clone();
        if same_object(&updated_obj, &old_obj) {
            return Ok(old_obj);
        }

        updated_obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
        s.resource_version_counter += 1;
        let finalizers_empty = updated_obj
            .metadata
            .finalizers
            .as_ref()
            .map_or(true, |finalizers| finalizers.is_empty());
        if updated_obj.metadata.deletion_timestamp.is_some() && finalizers_empty {
            Self::remove_and_collect(s, &key);
        } else {
            s.resources.insert(key, updated_obj.clone());
        }
        Ok(updated_obj)
    }

    pub fn handle_delete_request(s: &mut ApiServerState, key: &ObjectRef) -> Result<(), ApiError> {
        Self::admit(s, ApiMethod::Delete, key)?;
        let obj = s.resources.get_mut(key).ok_or(ApiError::ObjectNotFound)?;
        let has_finalizers = obj
            .metadata
            .finalizers
            .as_ref()
            .map_or(false, |finalizers| !finalizers.is_empty());
        if has_finalizers {
            if obj.metadata.deletion_timestamp.is_none() {
                obj.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
                obj.metadata.resource_version = Some(s.resource_version_counter.to_string());
                s.resource_version_counter += 1;
            }
        } else {
            Self::remove_and_collect(s, key);
            s.resource_version_counter += 1;
        }
        Ok(())
    }

    // Removes the object and, transitively, every object whose owner references
    // point at a removed uid.
    fn remove_and_collect(s: &mut ApiServerState, key: &ObjectRef) {
        let mut pending = vec![key.clone()];
        while let Some(key) = pending.pop() {
            let Some(removed) = s.resources.remove(&key) else {
                continue;
            };
            let Some(uid) = removed.metadata.uid else {
                continue;
            };
            let dependents = s.resources.iter().filter_map(|(dep_key, dep)| {
                let owned = dep
                    .metadata
                    .owner_references
                    .as_ref()
                    .map_or(false, |refs| refs.iter().any(|r| r.uid == uid));
                owned.then(|| dep_key.clone())
            });
            pending.extend(dependents.collect::<Vec<_>>());
        }
    }
}

fn same_object(a: &DynamicObject, b: &DynamicObject) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl ObjectStore for ApiServer {
    async fn get(&self, key: &ObjectRef) -> Result<DynamicObject, ApiError> {
        Self::handle_get_request(&mut self.lock(), key)
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        Self::handle_create_request(&mut self.lock(), obj)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, ApiError> {
        Self::handle_update_request(&mut self.lock(), obj)
    }

    async fn delete(&self, key: &ObjectRef) -> Result<(), ApiError> {
        Self::handle_delete_request(&mut self.lock(), key)
    }
}
