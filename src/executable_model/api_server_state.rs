// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::fault_injection::Fault;
use crate::kubernetes_api_objects::common::{Kind, ObjectRef};
use kube::api::DynamicObject;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Create,
    Update,
    Delete,
}

impl ApiMethod {
    pub fn is_write(&self) -> bool {
        !matches!(self, ApiMethod::Get)
    }
}

/// One request observed by the in-memory API server, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub method: ApiMethod,
    pub key: ObjectRef,
}

impl RequestRecord {
    pub fn kind(&self) -> Kind {
        self.key.kind
    }
}

// The "state" of the in-memory API server.
pub struct ApiServerState {
    pub resources: BTreeMap<ObjectRef, DynamicObject>,
    pub uid_counter: i64,
    pub resource_version_counter: i64,
    pub requests: Vec<RequestRecord>,
    pub faults: Vec<Fault>,
}

impl ApiServerState {
    pub fn new() -> ApiServerState {
        ApiServerState {
            resources: BTreeMap::new(),
            uid_counter: 0,
            resource_version_counter: 0,
            requests: Vec::new(),
            faults: Vec::new(),
        }
    }
}

impl Default for ApiServerState {
    fn default() -> Self {
        ApiServerState::new()
    }
}
