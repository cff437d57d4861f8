// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::crds::RadeonInstance;
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    marshal::marshal,
};
use crate::reconciler::engine::StageConfig;
use crate::shim_layer::store::ObjectStore;
use crate::Error;
use kube::ResourceExt;
use tracing::*;

/// Guards the cluster-scoped objects, which carry no owner reference and are
/// therefore never garbage collected with the instance.
pub const CLUSTER_RESOURCES_FINALIZER: &str = "cache.amd.com/cluster-resources";

pub fn has_finalizer(instance: &RadeonInstance) -> bool {
    instance
        .finalizers()
        .iter()
        .any(|f| f == CLUSTER_RESOURCES_FINALIZER)
}

pub async fn add_finalizer(store: &dyn ObjectStore, instance: &RadeonInstance) -> Result<(), Error> {
    if has_finalizer(instance) {
        return Ok(());
    }
    let mut updated = instance.clone();
    updated.finalizers_mut().push(CLUSTER_RESOURCES_FINALIZER.to_string());
    info!(instance = %updated.name_any(), "Adding finalizer");
    write_back(store, &updated).await
}

pub async fn remove_finalizer(store: &dyn ObjectStore, instance: &RadeonInstance) -> Result<(), Error> {
    if !has_finalizer(instance) {
        return Ok(());
    }
    let mut updated = instance.clone();
    updated.finalizers_mut().retain(|f| f != CLUSTER_RESOURCES_FINALIZER);
    info!(instance = %updated.name_any(), "Removing finalizer");
    write_back(store, &updated).await
}

/// Deletes the cluster-scoped objects of every stage, last stage first, then
/// releases the instance. Namespaces are left in place since the instance's
/// own namespace lives in one.
pub async fn cleanup_cluster_resources(
    store: &dyn ObjectStore,
    stages: &StageConfig,
    instance: &RadeonInstance,
) -> Result<(), Error> {
    if !has_finalizer(instance) {
        return Ok(());
    }
    for stage in stages.iter().rev() {
        for resource in stage.bundle().iter().collect::<Vec<_>>().into_iter().rev() {
            match resource.kind() {
                Kind::ClusterRoleKind | Kind::ClusterRoleBindingKind | Kind::SecurityContextConstraintsKind => {
                    let key = ObjectRef::new(resource.kind(), None, resource.name());
                    match store.delete(&key).await {
                        Ok(()) => info!(object = %key, "Deleted"),
                        Err(err) if err.is_not_found() => debug!(object = %key, "Already gone"),
                        Err(source) => return Err(Error::DeleteFailed { key, source }),
                    }
                }
                _ => {}
            }
        }
    }
    remove_finalizer(store, instance).await
}

async fn write_back(store: &dyn ObjectStore, instance: &RadeonInstance) -> Result<(), Error> {
    let key = ObjectRef::new(
        Kind::RadeonInstanceKind,
        instance.metadata.namespace.as_deref(),
        &instance.name_any(),
    );
    store
        .update(&marshal(instance)?)
        .await
        .map(|_| ())
        .map_err(|source| Error::UpdateFailed { key, source })
}
