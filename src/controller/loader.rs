// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::controls::ResourceControl;
use crate::kubernetes_api_objects::{common::Kind, resource::Resource, resource::ResourceBundle};
use crate::reconciler::control::ControlFunction;
use crate::reconciler::engine::{Stage, StageConfig};
use crate::Error;
use kube::api::DynamicObject;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::*;

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Loads the stage list from an asset directory.
///
/// Every sub-directory, in name order, is one stage. A directory without
/// sub-directories is a single stage. Within a stage the manifest files are
/// read in name order, and a file may hold several YAML documents.
pub fn load_stages(asset_dir: &Path) -> Result<StageConfig, Error> {
    let mut stage_dirs = Vec::new();
    for entry in read_dir(asset_dir)? {
        if entry.is_dir() {
            stage_dirs.push(entry);
        }
    }
    if stage_dirs.is_empty() {
        stage_dirs.push(asset_dir.to_path_buf());
    } else {
        for file in unstaged_manifests(asset_dir)? {
            warn!(path = %file.display(), "Manifest outside any stage directory, ignoring");
        }
    }

    let mut stages = Vec::new();
    for dir in stage_dirs {
        let mut resources = Vec::new();
        for file in read_dir(&dir)? {
            if is_manifest(&file) {
                let content = fs::read_to_string(&file).map_err(|source| Error::AssetReadFailed {
                    path: file.clone(),
                    source,
                })?;
                resources.extend(parse_manifests(&file, &content)?);
            }
        }
        if resources.is_empty() {
            warn!(path = %dir.display(), "Stage has no manifests, skipping");
            continue;
        }
        debug!(path = %dir.display(), resources = resources.len(), "Loaded stage");
        stages.push(stage_from_resources(resources));
    }

    info!(path = %asset_dir.display(), stages = stages.len(), "Loaded stage config");
    Ok(StageConfig::new(stages))
}

/// Manifest files at the top of an asset directory that also has stage
/// directories. They belong to no stage and are not loaded.
pub fn unstaged_manifests(asset_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = read_dir(asset_dir)?;
    if !entries.iter().any(|entry| entry.is_dir()) {
        return Ok(Vec::new());
    }
    Ok(entries.into_iter().filter(|entry| is_manifest(entry)).collect())
}

/// Builds a stage with one built-in control per descriptor.
pub fn stage_from_resources(resources: Vec<Resource>) -> Stage {
    let controls = resources
        .iter()
        .enumerate()
        .map(|(slot, resource)| Box::new(ResourceControl::new(slot, resource)) as Box<dyn ControlFunction>)
        .collect();
    Stage::new(ResourceBundle::new(resources), controls)
}

/// Decodes every non-empty document of a manifest file into a descriptor.
pub fn parse_manifests(path: &Path, content: &str) -> Result<Vec<Resource>, Error> {
    let parse_err = |source| Error::AssetParseFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document).map_err(parse_err)?;
        if value.is_null() {
            continue;
        }
        let obj: DynamicObject = serde_yaml::from_value(value).map_err(parse_err)?;
        let (api_version, kind) = obj
            .types
            .as_ref()
            .map(|t| (t.api_version.clone(), t.kind.clone()))
            .unwrap_or_default();
        let resource = Kind::from_type_meta(&api_version, &kind)
            .and_then(|k| Resource::from_dynamic_object(k, &obj))
            .ok_or_else(|| Error::UnsupportedKind {
                path: path.to_path_buf(),
                api_version,
                kind,
            })??;
        if resource.name().is_empty() {
            return Err(Error::InvalidDescriptor {
                name: path.display().to_string(),
                reason: format!("{} without metadata.name", resource.kind()),
            });
        }
        resources.push(resource);
    }
    Ok(resources)
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let read_err = |source| Error::AssetReadFailed {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        paths.push(entry.map_err(read_err)?.path());
    }
    paths.sort();
    Ok(paths)
}

fn is_manifest(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| MANIFEST_EXTENSIONS.contains(&ext))
}
