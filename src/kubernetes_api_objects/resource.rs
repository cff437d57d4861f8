// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::common::*;
use crate::kubernetes_api_objects::marshal::{marshal, unmarshal};
use crate::Error;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;

/// A resource descriptor: one immutable object template of a known kind.
///
/// The security policy has no typed binding in k8s-openapi, so it is carried
/// as a DynamicObject and patched through its JSON data.
#[derive(Debug, Clone)]
pub enum Resource {
    Namespace(corev1::Namespace),
    ServiceAccount(corev1::ServiceAccount),
    Role(rbacv1::Role),
    RoleBinding(rbacv1::RoleBinding),
    ClusterRole(rbacv1::ClusterRole),
    ClusterRoleBinding(rbacv1::ClusterRoleBinding),
    DaemonSet(appsv1::DaemonSet),
    SecurityContextConstraints(DynamicObject),
}

impl Resource {
    pub fn kind(&self) -> Kind {
        match self {
            Resource::Namespace(_) => Kind::NamespaceKind,
            Resource::ServiceAccount(_) => Kind::ServiceAccountKind,
            Resource::Role(_) => Kind::RoleKind,
            Resource::RoleBinding(_) => Kind::RoleBindingKind,
            Resource::ClusterRole(_) => Kind::ClusterRoleKind,
            Resource::ClusterRoleBinding(_) => Kind::ClusterRoleBindingKind,
            Resource::DaemonSet(_) => Kind::DaemonSetKind,
            Resource::SecurityContextConstraints(_) => Kind::SecurityContextConstraintsKind,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Namespace(obj) => &obj.metadata,
            Resource::ServiceAccount(obj) => &obj.metadata,
            Resource::Role(obj) => &obj.metadata,
            Resource::RoleBinding(obj) => &obj.metadata,
            Resource::ClusterRole(obj) => &obj.metadata,
            Resource::ClusterRoleBinding(obj) => &obj.metadata,
            Resource::DaemonSet(obj) => &obj.metadata,
            Resource::SecurityContextConstraints(obj) => &obj.metadata,
        }
    }

    /// Template name, or the empty string for a nameless template.
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn to_dynamic_object(&self) -> Result<DynamicObject, Error> {
        match self {
            Resource::Namespace(obj) => marshal(obj),
            Resource::ServiceAccount(obj) => marshal(obj),
            Resource::Role(obj) => marshal(obj),
            Resource::RoleBinding(obj) => marshal(obj),
            Resource::ClusterRole(obj) => marshal(obj),
            Resource::ClusterRoleBinding(obj) => marshal(obj),
            Resource::DaemonSet(obj) => marshal(obj),
            Resource::SecurityContextConstraints(obj) => Ok(obj.clone()),
        }
    }

    /// Decodes a dynamic object of the given kind into its typed descriptor.
    /// Returns None for kinds that are never managed as sub-resources.
    pub fn from_dynamic_object(kind: Kind, obj: &DynamicObject) -> Option<Result<Resource, Error>> {
        let res = match kind {
            Kind::NamespaceKind => unmarshal(obj).map(Resource::Namespace),
            Kind::ServiceAccountKind => unmarshal(obj).map(Resource::ServiceAccount),
            Kind::RoleKind => unmarshal(obj).map(Resource::Role),
            Kind::RoleBindingKind => unmarshal(obj).map(Resource::RoleBinding),
            Kind::ClusterRoleKind => unmarshal(obj).map(Resource::ClusterRole),
            Kind::ClusterRoleBindingKind => unmarshal(obj).map(Resource::ClusterRoleBinding),
            Kind::DaemonSetKind => unmarshal(obj).map(Resource::DaemonSet),
            Kind::SecurityContextConstraintsKind => Ok(Resource::SecurityContextConstraints(obj.clone())),
            Kind::RadeonInstanceKind => return None,
        };
        Some(res)
    }
}

/// The ordered descriptors of one stage.
#[derive(Debug, Clone, Default)]
pub struct ResourceBundle {
    resources: Vec<Resource>,
}

impl ResourceBundle {
    pub fn new(resources: Vec<Resource>) -> ResourceBundle {
        ResourceBundle { resources }
    }

    pub fn get(&self, slot: usize) -> Option<&Resource> {
        self.resources.get(slot)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }
}
