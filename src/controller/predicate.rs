// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::runtime::watcher;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::HashMap;
use tracing::*;

/// A change to a watched object, paired with what was seen before it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<K> {
    Create(K),
    Update { old: Option<K>, new: Option<K> },
    Delete(K),
}

impl<K> ChangeEvent<K> {
    /// The object whose owner should be reconciled.
    pub fn into_object(self) -> Option<K> {
        match self {
            ChangeEvent::Create(obj) | ChangeEvent::Delete(obj) => Some(obj),
            ChangeEvent::Update { new, .. } => new,
        }
    }
}

/// Create and delete always trigger a reconcile. An update triggers only
/// when both sides of it are known.
pub fn should_trigger<K>(event: &ChangeEvent<K>) -> bool {
    match event {
        ChangeEvent::Update { old: None, .. } => {
            warn!("Update event has no old object to update");
            false
        }
        ChangeEvent::Update { new: None, .. } => {
            warn!("Update event has no new object for update");
            false
        }
        _ => true,
    }
}

type Key = (Option<String>, String);

fn key_of<K: Resource>(obj: &K) -> Key {
    let meta = obj.meta();
    (meta.namespace.clone(), meta.name.clone().unwrap_or_default())
}

// slim keeps only the identity, version and owners of an object, which is
// all an old side or a relist deletion needs to be mapped to its owner.
fn slim<K: Resource + Default>(obj: &K) -> K {
    let meta = obj.meta();
    let mut slim = K::default();
    *slim.meta_mut() = ObjectMeta {
        name: meta.name.clone(),
        namespace: meta.namespace.clone(),
        uid: meta.uid.clone(),
        resource_version: meta.resource_version.clone(),
        owner_references: meta.owner_references.clone(),
        ..ObjectMeta::default()
    };
    slim
}

/// Turns raw watch events into change events by remembering the last
/// version seen of every object. Old sides carry metadata only.
#[derive(Debug)]
pub struct ChangeTracker<K> {
    seen: HashMap<Key, K>,
}

impl<K> Default for ChangeTracker<K> {
    fn default() -> Self {
        ChangeTracker { seen: HashMap::new() }
    }
}

impl<K: Resource + Default> ChangeTracker<K> {
    pub fn observe(&mut self, event: watcher::Event<K>) -> Vec<ChangeEvent<K>> {
        match event {
            watcher::Event::Applied(obj) => vec![self.applied(obj)],
            watcher::Event::Deleted(obj) => {
                self.seen.remove(&key_of(&obj));
                vec![ChangeEvent::Delete(obj)]
            }
            watcher::Event::Restarted(objs) => {
                // a relist replaces everything; objects missing from it were deleted meanwhile
                let mut previous = std::mem::take(&mut self.seen);
                let mut events = Vec::with_capacity(objs.len());
                for obj in objs {
                    let key = key_of(&obj);
                    self.seen.insert(key.clone(), slim(&obj));
                    events.push(match previous.remove(&key) {
                        Some(old) => ChangeEvent::Update {
                            old: Some(old),
                            new: Some(obj),
                        },
                        None => ChangeEvent::Create(obj),
                    });
                }
                events.extend(previous.into_values().map(ChangeEvent::Delete));
                events
            }
        }
    }

    fn applied(&mut self, obj: K) -> ChangeEvent<K> {
        match self.seen.insert(key_of(&obj), slim(&obj)) {
            Some(old) => ChangeEvent::Update {
                old: Some(old),
                new: Some(obj),
            },
            None => ChangeEvent::Create(obj),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
