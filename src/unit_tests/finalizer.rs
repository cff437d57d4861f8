// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::finalizer::*;
use crate::controller::reconcile::*;
use crate::crds::RadeonInstance;
use crate::executable_model::api_server_state::ApiMethod;
use crate::executable_model::ApiServer;
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    marshal::unmarshal,
};
use crate::shim_layer::store::ObjectStore;
use crate::unit_tests::common::*;

const PLUGIN: &str = "radeon-device-plugin";
const CLEANUP: ReconcileOptions = ReconcileOptions {
    cleanup_cluster_resources: true,
};

fn fetch_instance(server: &ApiServer, key: &ObjectRef) -> Option<RadeonInstance> {
    server.object(key).map(|obj| unmarshal(&obj).unwrap())
}

#[tokio::test]
pub async fn test_finalizer_is_added_before_converging() {
    println!("Testing that the finalizer is added...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    assert!(!has_finalizer(&instance));
    server.clear_requests();

    let outcome = reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Converged);
    assert!(has_finalizer(&fetch_instance(&server, &key).unwrap()));
    let first_write = &server.writes()[0];
    assert_eq!(first_write.method, ApiMethod::Update);
    assert_eq!(first_write.kind(), Kind::RadeonInstanceKind);

    // already present: no second instance write
    server.clear_requests();
    reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();
    assert!(server.writes().iter().all(|w| w.kind() != Kind::RadeonInstanceKind));
}

#[tokio::test]
pub async fn test_deleted_instance_releases_cluster_resources() {
    println!("Testing cleanup of cluster-scoped objects...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();

    server.delete(&key).await.unwrap();
    assert!(fetch_instance(&server, &key).unwrap().metadata.deletion_timestamp.is_some());
    server.clear_requests();

    let outcome = reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InstanceDeleted);

    let deleted: Vec<Kind> = server
        .writes()
        .iter()
        .filter(|w| w.method == ApiMethod::Delete)
        .map(|w| w.kind())
        .collect();
    assert_eq!(
        deleted,
        vec![
            Kind::SecurityContextConstraintsKind,
            Kind::ClusterRoleBindingKind,
            Kind::ClusterRoleKind,
        ]
    );
    for kind in [
        Kind::SecurityContextConstraintsKind,
        Kind::ClusterRoleBindingKind,
        Kind::ClusterRoleKind,
    ] {
        assert!(server.object(&ObjectRef::new(kind, None, PLUGIN)).is_none());
    }
    // the instance is gone and its owned objects with it; the namespace stays
    assert!(fetch_instance(&server, &key).is_none());
    assert!(server.object(&ObjectRef::new(Kind::DaemonSetKind, Some("ns-a"), PLUGIN)).is_none());
    assert!(server.object(&ObjectRef::new(Kind::NamespaceKind, None, "ns-a")).is_some());

    assert_eq!(
        reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap(),
        ReconcileOutcome::InstanceGone
    );
}

#[tokio::test]
pub async fn test_cleanup_ignores_missing_objects() {
    println!("Testing cleanup when cluster-scoped objects were never created...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let mut instance = make_instance("ns-a", "v1.2.3", "");
    instance.metadata.finalizers = Some(vec![CLUSTER_RESOURCES_FINALIZER.to_string()]);
    let instance = create_instance(&server, &instance).await;
    let key = instance_key(&instance);
    server.delete(&key).await.unwrap();

    let outcome = reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::InstanceDeleted);
    assert!(fetch_instance(&server, &key).is_none());
}

#[tokio::test]
pub async fn test_cleanup_disabled_leaves_instance_alone() {
    println!("Testing reconcile without the cleanup option...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    assert!(!has_finalizer(&fetch_instance(&server, &key).unwrap()));
    assert!(server.writes().iter().all(|w| w.method != ApiMethod::Delete));
}

#[tokio::test]
pub async fn test_finalizer_released_after_cleanup_is_turned_off() {
    println!("Testing release of a deleting instance with cleanup disabled...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    reconcile_instance(&server, &stages, &key, &CLEANUP).await.unwrap();
    server.delete(&key).await.unwrap();
    server.clear_requests();

    let outcome = reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::InstanceDeleted);
    assert!(fetch_instance(&server, &key).is_none());

    // only the finalizer release was written; cluster-scoped objects are kept
    let writes = server.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, ApiMethod::Update);
    assert_eq!(writes[0].kind(), Kind::RadeonInstanceKind);
    assert!(server.object(&ObjectRef::new(Kind::ClusterRoleKind, None, PLUGIN)).is_some());

    assert_eq!(
        reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
            .await
            .unwrap(),
        ReconcileOutcome::InstanceGone
    );
}

#[tokio::test]
pub async fn test_deleting_instance_is_not_converged_again() {
    println!("Testing a deleting instance held by another finalizer...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let mut instance = make_instance("ns-a", "v1.2.3", "");
    instance.metadata.finalizers = Some(vec!["example.com/hold".to_string()]);
    let instance = create_instance(&server, &instance).await;
    let key = instance_key(&instance);
    server.delete(&key).await.unwrap();
    server.clear_requests();

    for options in [ReconcileOptions::default(), CLEANUP] {
        let outcome = reconcile_instance(&server, &stages, &key, &options).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::InstanceDeleted);
    }
    assert!(server.writes().is_empty());
    let held = fetch_instance(&server, &key).unwrap();
    assert_eq!(held.metadata.finalizers, Some(vec!["example.com/hold".to_string()]));
    assert!(server.object(&ObjectRef::new(Kind::NamespaceKind, None, "ns-a")).is_none());
}
