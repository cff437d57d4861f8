// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::crds::RadeonInstance;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::api::DynamicObject;
use kube::core::{ApiResource, GroupVersionKind};
use std::fmt;

pub const SECURITY_GROUP: &str = "security.openshift.io";
pub const SECURITY_VERSION: &str = "v1";

/// Kind tags every object the controller reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    RadeonInstanceKind,
    NamespaceKind,
    ServiceAccountKind,
    RoleKind,
    RoleBindingKind,
    ClusterRoleKind,
    ClusterRoleBindingKind,
    DaemonSetKind,
    SecurityContextConstraintsKind,
}

/// How a control function treats an object that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Desired state never changes after creation, so an existing object is left alone.
    CreateOnly,
    /// The desired state is written back on every reconcile.
    Converge,
}

impl Kind {
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Kind::RadeonInstanceKind => ApiResource::erase::<RadeonInstance>(&()),
            Kind::NamespaceKind => ApiResource::erase::<corev1::Namespace>(&()),
            Kind::ServiceAccountKind => ApiResource::erase::<corev1::ServiceAccount>(&()),
            Kind::RoleKind => ApiResource::erase::<rbacv1::Role>(&()),
            Kind::RoleBindingKind => ApiResource::erase::<rbacv1::RoleBinding>(&()),
            Kind::ClusterRoleKind => ApiResource::erase::<rbacv1::ClusterRole>(&()),
            Kind::ClusterRoleBindingKind => ApiResource::erase::<rbacv1::ClusterRoleBinding>(&()),
            Kind::DaemonSetKind => ApiResource::erase::<appsv1::DaemonSet>(&()),
            Kind::SecurityContextConstraintsKind => ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk(SECURITY_GROUP, SECURITY_VERSION, "SecurityContextConstraints"),
                "securitycontextconstraints",
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::RadeonInstanceKind => "RadeonInstance",
            Kind::NamespaceKind => "Namespace",
            Kind::ServiceAccountKind => "ServiceAccount",
            Kind::RoleKind => "Role",
            Kind::RoleBindingKind => "RoleBinding",
            Kind::ClusterRoleKind => "ClusterRole",
            Kind::ClusterRoleBindingKind => "ClusterRoleBinding",
            Kind::DaemonSetKind => "DaemonSet",
            Kind::SecurityContextConstraintsKind => "SecurityContextConstraints",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        match self {
            Kind::RadeonInstanceKind
            | Kind::ServiceAccountKind
            | Kind::RoleKind
            | Kind::RoleBindingKind
            | Kind::DaemonSetKind => true,
            Kind::NamespaceKind
            | Kind::ClusterRoleKind
            | Kind::ClusterRoleBindingKind
            | Kind::SecurityContextConstraintsKind => false,
        }
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        match self {
            Kind::NamespaceKind | Kind::ServiceAccountKind => UpdatePolicy::CreateOnly,
            _ => UpdatePolicy::Converge,
        }
    }

    /// Resolves the kind from an object's `apiVersion` and `kind` fields.
    pub fn from_type_meta(api_version: &str, kind: &str) -> Option<Kind> {
        let all = [
            Kind::RadeonInstanceKind,
            Kind::NamespaceKind,
            Kind::ServiceAccountKind,
            Kind::RoleKind,
            Kind::RoleBindingKind,
            Kind::ClusterRoleKind,
            Kind::ClusterRoleBindingKind,
            Kind::DaemonSetKind,
            Kind::SecurityContextConstraintsKind,
        ];
        all.into_iter().find(|k| {
            let ar = k.api_resource();
            ar.api_version == api_version && ar.kind == kind
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one object in the backing store.
/// Cluster-scoped objects never carry a namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef {
    pub kind: Kind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: Kind, namespace: Option<&str>, name: &str) -> ObjectRef {
        ObjectRef {
            kind,
            namespace: if kind.is_namespaced() {
                namespace.map(str::to_string)
            } else {
                None
            },
            name: name.to_string(),
        }
    }

    /// Returns None when the object misses its type meta, its name, or has an unknown kind.
    pub fn from_dynamic(obj: &DynamicObject) -> Option<ObjectRef> {
        let types = obj.types.as_ref()?;
        let kind = Kind::from_type_meta(&types.api_version, &types.kind)?;
        let name = obj.metadata.name.as_deref()?;
        Some(ObjectRef::new(kind, obj.metadata.namespace.as_deref(), name))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}/{}", self.kind, namespace, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}
