// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::reconcile::{reconcile_instance, ReconcileOptions};
use crate::crds::RadeonInstance;
use crate::executable_model::ApiServer;
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    marshal::marshal,
};
use crate::reconciler::engine::StageConfig;
use crate::shim_layer::store::ObjectStore;
use crate::Error;
use kube::api::DynamicObject;
use kube::ResourceExt;

/// Runs one reconcile pass for `instance` against an empty in-memory API
/// server and returns every object it produced, in store order.
pub async fn render_instance(stages: &StageConfig, instance: &RadeonInstance) -> Result<Vec<DynamicObject>, Error> {
    let server = ApiServer::new();
    let key = ObjectRef::new(
        Kind::RadeonInstanceKind,
        instance.metadata.namespace.as_deref(),
        &instance.name_any(),
    );
    server
        .create(&marshal(instance)?)
        .await
        .map_err(|source| Error::CreateFailed {
            key: key.clone(),
            source,
        })?;
    reconcile_instance(&server, stages, &key, &ReconcileOptions::default()).await?;
    Ok(server
        .objects()
        .into_iter()
        .filter(|obj| ObjectRef::from_dynamic(obj).map_or(false, |k| k.kind != Kind::RadeonInstanceKind))
        .collect())
}
