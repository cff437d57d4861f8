// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::crds::RadeonInstance;
use crate::kubernetes_api_objects::{
    common::{Kind, ObjectRef, UpdatePolicy},
    marshal::marshal,
    resource::Resource,
};
use crate::reconciler::control::{ControlFunction, ResourceStatus};
use crate::reconciler::engine::EngineState;
use crate::Error;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::Resource as _;
use serde_json::{json, Value};
use tracing::*;

/// The control function for one descriptor of a stage, dispatched on the
/// descriptor's kind.
#[derive(Debug, Clone)]
pub struct ResourceControl {
    slot: usize,
    kind: Kind,
    name: String,
}

impl ResourceControl {
    pub fn new(slot: usize, resource: &Resource) -> ResourceControl {
        ResourceControl {
            slot,
            kind: resource.kind(),
            name: resource.name().to_string(),
        }
    }
}

#[async_trait]
impl ControlFunction for ResourceControl {
    fn name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    async fn converge(&self, state: &EngineState<'_>) -> Result<ResourceStatus, Error> {
        let resource = state
            .current_stage()
            .and_then(|stage| stage.bundle().get(self.slot))
            .filter(|resource| resource.kind() == self.kind)
            .ok_or(Error::MissingDescriptor {
                stage: state.idx,
                slot: self.slot,
            })?;
        match resource {
            Resource::Namespace(obj) => namespace(state, obj).await,
            Resource::ServiceAccount(obj) => service_account(state, obj).await,
            Resource::Role(obj) => role(state, obj).await,
            Resource::RoleBinding(obj) => role_binding(state, obj).await,
            Resource::ClusterRole(obj) => cluster_role(state, obj).await,
            Resource::ClusterRoleBinding(obj) => cluster_role_binding(state, obj).await,
            Resource::DaemonSet(obj) => daemon_set(state, obj).await,
            Resource::SecurityContextConstraints(obj) => security_context_constraints(state, obj).await,
        }
    }
}

pub async fn namespace(state: &EngineState<'_>, template: &corev1::Namespace) -> Result<ResourceStatus, Error> {
    let desired = make_namespace(template, state.instance_namespace()?);
    converge_object(state, marshal(&desired)?).await
}

pub async fn service_account(state: &EngineState<'_>, template: &corev1::ServiceAccount) -> Result<ResourceStatus, Error> {
    let desired = make_service_account(template, state.instance)?;
    converge_object(state, marshal(&desired)?).await
}

pub async fn role(state: &EngineState<'_>, template: &rbacv1::Role) -> Result<ResourceStatus, Error> {
    let desired = make_role(template, state.instance)?;
    converge_object(state, marshal(&desired)?).await
}

pub async fn role_binding(state: &EngineState<'_>, template: &rbacv1::RoleBinding) -> Result<ResourceStatus, Error> {
    let desired = make_role_binding(template, state.instance)?;
    converge_object(state, marshal(&desired)?).await
}

pub async fn cluster_role(state: &EngineState<'_>, template: &rbacv1::ClusterRole) -> Result<ResourceStatus, Error> {
    converge_object(state, marshal(template)?).await
}

pub async fn cluster_role_binding(state: &EngineState<'_>, template: &rbacv1::ClusterRoleBinding) -> Result<ResourceStatus, Error> {
    let desired = make_cluster_role_binding(template, state.instance_namespace()?);
    converge_object(state, marshal(&desired)?).await
}

pub async fn daemon_set(state: &EngineState<'_>, template: &appsv1::DaemonSet) -> Result<ResourceStatus, Error> {
    let desired = make_daemon_set(template, state.instance)?;
    converge_object(state, marshal(&desired)?).await
}

pub async fn security_context_constraints(state: &EngineState<'_>, template: &DynamicObject) -> Result<ResourceStatus, Error> {
    let policy_name = template.metadata.name.as_deref().unwrap_or_default();
    let service_account = state
        .stages
        .resources()
        .find_map(|resource| match resource {
            Resource::ServiceAccount(sa) => sa.metadata.name.as_deref(),
            _ => None,
        })
        .unwrap_or(policy_name);
    let principal = service_account_principal(state.instance_namespace()?, service_account);
    let desired = make_security_context_constraints(template, &principal);
    converge_object(state, desired).await
}

// converge_object reconciles one desired object against the backing store:
// create it when absent; when present, either leave it alone or write the
// desired state back, depending on the kind's update policy.
async fn converge_object(state: &EngineState<'_>, mut desired: DynamicObject) -> Result<ResourceStatus, Error> {
    let key = ObjectRef::from_dynamic(&desired).ok_or_else(|| Error::InvalidDescriptor {
        name: desired.metadata.name.clone().unwrap_or_default(),
        reason: "missing apiVersion, kind or name".to_string(),
    })?;

    info!(object = %key, "Looking for");
    let existing = match state.store.get(&key).await {
        Ok(existing) => existing,
        Err(err) if err.is_not_found() => {
            info!(object = %key, "Not found, creating");
            if let Err(source) = state.store.create(&desired).await {
                info!(object = %key, error = %source, "Couldn't create");
                return Err(Error::CreateFailed { key, source });
            }
            return Ok(ResourceStatus::Ready);
        }
        Err(source) => return Err(Error::GetFailed { key, source }),
    };

    match key.kind.update_policy() {
        UpdatePolicy::CreateOnly => {
            info!(object = %key, "Found, skipping update");
        }
        UpdatePolicy::Converge => {
            info!(object = %key, "Found, updating");
            desired.metadata.resource_version = existing.metadata.resource_version;
            if let Err(source) = state.store.update(&desired).await {
                return Err(Error::UpdateFailed { key, source });
            }
        }
    }
    Ok(ResourceStatus::Ready)
}

pub fn service_account_principal(namespace: &str, service_account: &str) -> String {
    format!("system:serviceaccount:{}:{}", namespace, service_account)
}

// set_controller_reference makes the instance the controlling owner of the object,
// replacing any previous controller reference.
pub fn set_controller_reference(metadata: &mut ObjectMeta, instance: &RadeonInstance) -> Result<(), Error> {
    let owner = instance
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey(".metadata.uid"))?;
    let owner_refs = metadata.owner_references.get_or_insert_with(Vec::new);
    owner_refs.retain(|r| r.controller != Some(true) && r.uid != owner.uid);
    owner_refs.push(owner);
    Ok(())
}

fn namespaced_meta(template: &ObjectMeta, instance: &RadeonInstance) -> Result<ObjectMeta, Error> {
    let mut metadata = template.clone();
    metadata.namespace = Some(
        instance
            .metadata
            .namespace
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
    );
    set_controller_reference(&mut metadata, instance)?;
    Ok(metadata)
}

fn bind_service_accounts(subjects: &mut Option<Vec<rbacv1::Subject>>, namespace: &str) {
    for subject in subjects.iter_mut().flatten() {
        if subject.kind == "ServiceAccount" {
            subject.namespace = Some(namespace.to_string());
        }
    }
}

pub fn make_namespace(template: &corev1::Namespace, namespace: &str) -> corev1::Namespace {
    let mut obj = template.clone();
    obj.metadata.name = Some(namespace.to_string());
    obj.metadata.namespace = None;
    obj
}

pub fn make_service_account(template: &corev1::ServiceAccount, instance: &RadeonInstance) -> Result<corev1::ServiceAccount, Error> {
    Ok(corev1::ServiceAccount {
        metadata: namespaced_meta(&template.metadata, instance)?,
        ..template.clone()
    })
}

pub fn make_role(template: &rbacv1::Role, instance: &RadeonInstance) -> Result<rbacv1::Role, Error> {
    Ok(rbacv1::Role {
        metadata: namespaced_meta(&template.metadata, instance)?,
        ..template.clone()
    })
}

pub fn make_role_binding(template: &rbacv1::RoleBinding, instance: &RadeonInstance) -> Result<rbacv1::RoleBinding, Error> {
    let metadata = namespaced_meta(&template.metadata, instance)?;
    let mut obj = rbacv1::RoleBinding {
        metadata,
        ..template.clone()
    };
    if let Some(namespace) = obj.metadata.namespace.clone() {
        bind_service_accounts(&mut obj.subjects, &namespace);
    }
    Ok(obj)
}

pub fn make_cluster_role_binding(template: &rbacv1::ClusterRoleBinding, namespace: &str) -> rbacv1::ClusterRoleBinding {
    let mut obj = template.clone();
    bind_service_accounts(&mut obj.subjects, namespace);
    obj
}

pub fn make_daemon_set(template: &appsv1::DaemonSet, instance: &RadeonInstance) -> Result<appsv1::DaemonSet, Error> {
    let mut obj = appsv1::DaemonSet {
        metadata: namespaced_meta(&template.metadata, instance)?,
        ..template.clone()
    };
    let container = obj
        .spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
        .and_then(|pod_spec| pod_spec.containers.first_mut())
        .ok_or_else(|| Error::InvalidDescriptor {
            name: template.metadata.name.clone().unwrap_or_default(),
            reason: "daemon set has no container".to_string(),
        })?;
    if !instance.spec.image_path().is_empty() {
        container.image = Some(instance.spec.image_path().to_string());
    }
    container.image_pull_policy = Some(instance.spec.image_policy().to_string());
    Ok(obj)
}

// The first user of the policy is the principal the device plugin runs as.
pub fn make_security_context_constraints(template: &DynamicObject, principal: &str) -> DynamicObject {
    let mut obj = template.clone();
    obj.metadata.namespace = None;
    if !obj.data.is_object() {
        obj.data = json!({});
    }
    if let Some(data) = obj.data.as_object_mut() {
        match data.get_mut("users").and_then(Value::as_array_mut) {
            Some(users) if !users.is_empty() => users[0] = Value::String(principal.to_string()),
            Some(users) => users.push(Value::String(principal.to_string())),
            None => {
                data.insert("users".to_string(), json!([principal]));
            }
        }
    }
    obj
}
