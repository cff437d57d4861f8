// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::reconcile::*;
use crate::controller::render::render_instance;
use crate::executable_model::api_server_state::{ApiMethod, RequestRecord};
use crate::executable_model::ApiServer;
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef},
    error::ApiError,
    marshal::unmarshal,
};
use crate::unit_tests::common::*;
use crate::Error;
use k8s_openapi::api::apps::v1 as appsv1;
use kube::api::DynamicObject;

const PLUGIN: &str = "radeon-device-plugin";

fn created_kinds(requests: &[RequestRecord]) -> Vec<Kind> {
    requests
        .iter()
        .filter(|r| r.method == ApiMethod::Create)
        .map(|r| r.kind())
        .collect()
}

fn stored(server: &ApiServer, kind: Kind, namespace: Option<&str>) -> DynamicObject {
    server.object(&ObjectRef::new(kind, namespace, PLUGIN)).unwrap()
}

#[tokio::test]
pub async fn test_instance_gone() {
    println!("Testing reconcile of a missing instance...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let key = ObjectRef::new(Kind::RadeonInstanceKind, Some("ns-a"), "radeon");
    let outcome = reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::InstanceGone);
    assert!(server.writes().is_empty());
}

#[tokio::test]
pub async fn test_instance_get_failure_is_retryable_error() {
    println!("Testing reconcile when the instance cannot be read...");
    let server = ApiServer::new();
    server.inject_fault(ApiMethod::Get, Kind::RadeonInstanceKind, ApiError::ServerTimeout);
    let stages = fixture_stages();
    let key = ObjectRef::new(Kind::RadeonInstanceKind, Some("ns-a"), "radeon");
    assert!(matches!(
        reconcile_instance(&server, &stages, &key, &ReconcileOptions::default()).await,
        Err(Error::GetFailed { .. })
    ));
}

#[tokio::test]
pub async fn test_full_pass_from_scratch() {
    println!("Testing a full pass against an empty cluster...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    server.clear_requests();

    let outcome = reconcile_instance(&server, &stages, &instance_key(&instance), &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Converged);
    assert_eq!(
        created_kinds(&server.requests()),
        vec![
            Kind::NamespaceKind,
            Kind::ServiceAccountKind,
            Kind::RoleKind,
            Kind::RoleBindingKind,
            Kind::ClusterRoleKind,
            Kind::ClusterRoleBindingKind,
            Kind::DaemonSetKind,
            Kind::SecurityContextConstraintsKind,
        ]
    );

    assert!(server.object(&ObjectRef::new(Kind::NamespaceKind, None, "ns-a")).is_some());

    let ds: appsv1::DaemonSet = unmarshal(&stored(&server, Kind::DaemonSetKind, Some("ns-a"))).unwrap();
    let owner_refs = ds.metadata.owner_references.clone().unwrap();
    assert_eq!(Some(owner_refs[0].uid.clone()), instance.metadata.uid);
    let pod_spec = ds.spec.unwrap().template.spec.unwrap();
    assert_eq!(pod_spec.containers[0].image.as_deref(), Some("v1.2.3"));
    assert_eq!(pod_spec.containers[0].image_pull_policy.as_deref(), Some("IfNotPresent"));

    let scc = stored(&server, Kind::SecurityContextConstraintsKind, None);
    assert_eq!(scc.data["users"][0], "system:serviceaccount:ns-a:radeon-device-plugin");
    assert_eq!(scc.metadata.owner_references, None);

    let crb = stored(&server, Kind::ClusterRoleBindingKind, None);
    assert_eq!(crb.data["subjects"][0]["namespace"], "ns-a");
}

#[tokio::test]
pub async fn test_second_pass_writes_nothing_new() {
    println!("Testing a pass against a converged cluster...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    let before = server.objects();
    server.clear_requests();

    let outcome = reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Converged);

    let writes = server.writes();
    assert!(writes.iter().all(|w| w.method == ApiMethod::Update));
    let updated: Vec<Kind> = writes.iter().map(|w| w.kind()).collect();
    assert_eq!(
        updated,
        vec![
            Kind::RoleKind,
            Kind::RoleBindingKind,
            Kind::ClusterRoleKind,
            Kind::ClusterRoleBindingKind,
            Kind::DaemonSetKind,
            Kind::SecurityContextConstraintsKind,
        ]
    );
    // every update was a no-op
    let after = server.objects();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.metadata.resource_version, a.metadata.resource_version);
    }
}

#[tokio::test]
pub async fn test_workload_failure_stops_the_pass() {
    println!("Testing a pass where the workload cannot be created...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    let instance = create_instance(&server, &make_instance("ns-a", "v1.2.3", "")).await;
    let key = instance_key(&instance);
    server.inject_fault(ApiMethod::Create, Kind::DaemonSetKind, ApiError::Forbidden);
    server.clear_requests();

    match reconcile_instance(&server, &stages, &key, &ReconcileOptions::default()).await {
        Err(Error::CreateFailed { key, source }) => {
            assert_eq!(key.kind, Kind::DaemonSetKind);
            assert_eq!(source, ApiError::Forbidden);
        }
        other => panic!("unexpected result {:?}", other),
    }
    for kind in [Kind::RoleKind, Kind::RoleBindingKind, Kind::ServiceAccountKind] {
        assert!(server.object(&ObjectRef::new(kind, Some("ns-a"), PLUGIN)).is_some());
    }
    for kind in [Kind::ClusterRoleKind, Kind::ClusterRoleBindingKind] {
        assert!(server.object(&ObjectRef::new(kind, None, PLUGIN)).is_some());
    }
    assert!(server.object(&ObjectRef::new(Kind::DaemonSetKind, Some("ns-a"), PLUGIN)).is_none());
    assert!(server
        .requests()
        .iter()
        .all(|r| r.kind() != Kind::SecurityContextConstraintsKind));

    // the retry starts over from the first stage and finishes
    server.clear_faults();
    server.clear_requests();
    let outcome = reconcile_instance(&server, &stages, &key, &ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Converged);
    let requests = server.requests();
    assert_eq!(requests[1].kind(), Kind::NamespaceKind);
    assert_eq!(created_kinds(&requests), vec![Kind::DaemonSetKind, Kind::SecurityContextConstraintsKind]);
}

#[tokio::test]
pub async fn test_instances_in_different_namespaces() {
    println!("Testing two instances sharing the stage config...");
    let server = ApiServer::new();
    let stages = fixture_stages();
    for namespace in ["ns-a", "ns-b"] {
        let instance = create_instance(&server, &make_instance(namespace, "v1.2.3", "Always")).await;
        reconcile_instance(&server, &stages, &instance_key(&instance), &ReconcileOptions::default())
            .await
            .unwrap();
        assert!(server.object(&ObjectRef::new(Kind::DaemonSetKind, Some(namespace), PLUGIN)).is_some());
    }
    // the shared security policy follows the last instance reconciled
    let scc = stored(&server, Kind::SecurityContextConstraintsKind, None);
    assert_eq!(scc.data["users"][0], "system:serviceaccount:ns-b:radeon-device-plugin");
}

#[tokio::test]
pub async fn test_render_instance() {
    println!("Testing render_instance()...");
    let stages = fixture_stages();
    let objects = render_instance(&stages, &make_instance("ns-a", "v1.2.3", "Never"))
        .await
        .unwrap();
    assert_eq!(objects.len(), 8);
    assert!(objects
        .iter()
        .all(|obj| obj.types.as_ref().unwrap().kind != "RadeonInstance"));
}
