// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::predicate::{should_trigger, ChangeEvent, ChangeTracker};
use crate::controller::reconcile::{reconcile_instance, ReconcileOptions};
use crate::crds::RadeonInstance;
use crate::kubernetes_api_objects::common::{Kind, ObjectRef};
use crate::reconciler::engine::StageConfig;
use crate::shim_layer::store::ObjectStore;
use crate::Error;
use core::fmt::Debug;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use kube::{
    api::Api,
    runtime::{
        controller::{Action, Controller},
        watcher, WatchStreamExt,
    },
    Client, Resource,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::*;

// The shim layer connects the convergence engine to the kube-rs controller runtime.
// kube-rs calls reconcile whenever a RadeonInstance, or a DaemonSet or
// ServiceAccount it owns, changes.

/// Shared context of every reconcile call.
pub struct Data {
    pub store: Arc<dyn ObjectStore>,
    pub stages: Arc<StageConfig>,
    pub options: ReconcileOptions,
    pub error_requeue: Duration,
}

// run_controller prepares and runs the controller until a termination signal arrives.
pub async fn run_controller(client: Client, data: Data) -> anyhow::Result<()> {
    let instances = Api::<RadeonInstance>::all(client.clone());
    let daemon_sets = Api::<appsv1::DaemonSet>::all(client.clone());
    let service_accounts = Api::<corev1::ServiceAccount>::all(client);

    info!("starting controller");
    Controller::new(instances, watcher::Config::default())
        .owns_stream(filtered_changes(daemon_sets))
        .owns_stream(filtered_changes(service_accounts))
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(data))
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("reconciled {:?}", o),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;
    info!("controller terminated");
    Ok(())
}

// filtered_changes watches owned objects and only lets through the changes
// that should trigger a reconcile of their owner.
fn filtered_changes<K>(api: Api<K>) -> impl Stream<Item = Result<K, watcher::Error>> + Send + 'static
where
    K: Resource<DynamicType = ()> + Clone + Default + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let mut tracker = ChangeTracker::<K>::default();
    watcher(api, watcher::Config::default())
        .default_backoff()
        .map_ok(move |event| {
            let objects: Vec<Result<K, watcher::Error>> = tracker
                .observe(event)
                .into_iter()
                .filter(should_trigger)
                .filter_map(ChangeEvent::into_object)
                .map(Ok)
                .collect();
            stream::iter(objects)
        })
        .try_flatten()
}

pub async fn reconcile(instance: Arc<RadeonInstance>, data: Arc<Data>) -> Result<Action, Error> {
    let name = instance
        .meta()
        .name
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = instance
        .meta()
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let key = ObjectRef::new(Kind::RadeonInstanceKind, Some(namespace), name);
    let outcome = reconcile_instance(data.store.as_ref(), &data.stages, &key, &data.options).await?;
    debug!(instance = %key, ?outcome, "Reconcile finished");
    Ok(Action::await_change())
}

// error_policy defines the controller's behavior when the reconcile ends with an error.
pub fn error_policy(_instance: Arc<RadeonInstance>, error: &Error, data: Arc<Data>) -> Action {
    warn!(%error, requeue_after = ?data.error_requeue, "Reconcile failed");
    Action::requeue(data.error_requeue)
}
