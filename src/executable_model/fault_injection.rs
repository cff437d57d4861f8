// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::executable_model::api_server_state::ApiMethod;
use crate::kubernetes_api_objects::{common::Kind, error::ApiError};

/// A request failure injected into the in-memory API server.
/// Every request matching `method` and `kind` fails with `error` until the
/// fault is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub method: ApiMethod,
    pub kind: Kind,
    pub error: ApiError,
}

pub fn injected_error(faults: &[Fault], method: ApiMethod, kind: Kind) -> Option<ApiError> {
    faults
        .iter()
        .find(|fault| fault.method == method && fault.kind == kind)
        .map(|fault| fault.error.clone())
}
