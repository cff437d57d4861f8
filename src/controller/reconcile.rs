// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::finalizer;
use crate::crds::RadeonInstance;
use crate::kubernetes_api_objects::{common::ObjectRef, marshal::unmarshal};
use crate::reconciler::engine::{ConvergenceEngine, StageConfig};
use crate::shim_layer::store::ObjectStore;
use crate::Error;
use tracing::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The instance no longer exists; nothing to do.
    InstanceGone,
    /// Every stage converged.
    Converged,
    /// The instance is being deleted; the finalizer was released, after
    /// removing the cluster-scoped objects when cleanup is enabled.
    InstanceDeleted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub cleanup_cluster_resources: bool,
}

/// One reconcile pass for the instance at `key`. A fresh engine walks the
/// stages from the first one; any failure aborts the pass and is returned so
/// the caller can retry later.
pub async fn reconcile_instance(
    store: &dyn ObjectStore,
    stages: &StageConfig,
    key: &ObjectRef,
    options: &ReconcileOptions,
) -> Result<ReconcileOutcome, Error> {
    info!(instance = %key, "Reconciling RadeonInstance");
    let obj = match store.get(key).await {
        Ok(obj) => obj,
        Err(err) if err.is_not_found() => {
            info!(instance = %key, "RadeonInstance resource not found, ignoring since object must be deleted");
            return Ok(ReconcileOutcome::InstanceGone);
        }
        Err(source) => {
            warn!(instance = %key, error = %source, "Failed to get RadeonInstance");
            return Err(Error::GetFailed {
                key: key.clone(),
                source,
            });
        }
    };
    let instance: RadeonInstance = unmarshal(&obj)?;

    // a terminating instance is only released, never converged again
    if instance.metadata.deletion_timestamp.is_some() {
        if options.cleanup_cluster_resources {
            finalizer::cleanup_cluster_resources(store, stages, &instance).await?;
        } else {
            finalizer::remove_finalizer(store, &instance).await?;
        }
        info!(instance = %key, "RadeonInstance is being deleted, released");
        return Ok(ReconcileOutcome::InstanceDeleted);
    }
    if options.cleanup_cluster_resources {
        finalizer::add_finalizer(store, &instance).await?;
    }

    let mut engine = ConvergenceEngine::init(store, stages, &instance);
    if let Err(err) = engine.run().await {
        warn!(instance = %key, stage = engine.stage_index(), error = %err, "Convergence aborted");
        return Err(err);
    }
    info!(instance = %key, stages = stages.len(), "All stages converged");
    Ok(ReconcileOutcome::Converged)
}
