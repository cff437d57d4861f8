// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::controller::reconcile::ReconcileOptions;
use crate::crds::{RadeonInstance, RadeonInstanceSpec};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ASSETS_DIR: &str = "/opt/device-plugin";

#[derive(Debug, Parser)]
#[command(name = "radeon-instance-controller", version, about = "Deploys the Radeon device plugin for every RadeonInstance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the RadeonInstance custom resource definition
    Export,
    /// Run the controller against the current cluster
    Run(RunArgs),
    /// Print the objects one reconcile would produce for an instance, without a cluster
    Render(RenderArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Directory holding one sub-directory of manifests per stage
    #[arg(long, env = "RADEON_ASSETS_DIR", default_value = DEFAULT_ASSETS_DIR)]
    pub assets_dir: PathBuf,
    /// Seconds to wait before retrying a failed reconcile
    #[arg(long, env = "RADEON_ERROR_REQUEUE_SECS", default_value_t = 10)]
    pub error_requeue_secs: u64,
    /// Delete cluster-scoped objects when an instance is deleted. These objects are
    /// shared by every instance, so deleting one instance removes them for all others
    #[arg(long, env = "RADEON_CLEANUP_CLUSTER_RESOURCES")]
    pub cleanup_cluster_resources: bool,
}

impl RunArgs {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            cleanup_cluster_resources: self.cleanup_cluster_resources,
        }
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    #[arg(long, env = "RADEON_ASSETS_DIR", default_value = DEFAULT_ASSETS_DIR)]
    pub assets_dir: PathBuf,
    #[arg(long, default_value = "radeon")]
    pub name: String,
    #[arg(long)]
    pub namespace: String,
    #[arg(long, default_value = "")]
    pub image: String,
    #[arg(long, default_value = "")]
    pub pull_policy: String,
}

impl RenderArgs {
    /// The instance to render. The in-memory server assigns its uid.
    pub fn instance(&self) -> RadeonInstance {
        let mut instance = RadeonInstance::new(
            &self.name,
            RadeonInstanceSpec {
                namespace: self.namespace.clone(),
                image: self.image.clone(),
                image_pull_policy: self.pull_policy.clone(),
            },
        );
        instance.metadata.namespace = Some(self.namespace.clone());
        instance
    }
}
