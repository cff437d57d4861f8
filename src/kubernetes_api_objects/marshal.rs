// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::Error;
use kube::api::DynamicObject;
use serde::{de::DeserializeOwned, Serialize};

/// Marshal a typed object into a DynamicObject, keeping its apiVersion and kind.
pub fn marshal<K: Serialize>(obj: &K) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(obj).map_err(Error::MarshalFailed)?;
    serde_json::from_value(value).map_err(Error::MarshalFailed)
}

/// Unmarshal a DynamicObject back into its typed form.
pub fn unmarshal<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K, Error> {
    let value = serde_json::to_value(obj).map_err(Error::MarshalFailed)?;
    serde_json::from_value(value).map_err(Error::MarshalFailed)
}
