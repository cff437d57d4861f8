// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use clap::Parser;
use kube::{Client, CustomResourceExt};
use radeon_operator::config::{Cli, Command};
use radeon_operator::controller::{loader::load_stages, render::render_instance};
use radeon_operator::crds::RadeonInstance;
use radeon_operator::shim_layer::{
    controller_runtime::{run_controller, Data},
    kube_store::KubeStore,
};
use std::sync::Arc;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the exported manifests, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Export => {
            info!("exporting custom resource definition");
            println!("{}", serde_yaml::to_string(&RadeonInstance::crd())?);
        }
        Command::Run(args) => {
            info!("running radeon-instance-controller");
            let stages = Arc::new(load_stages(&args.assets_dir)?);
            let client = Client::try_default().await?;
            let data = Data {
                store: Arc::new(KubeStore::new(client.clone())),
                stages,
                options: args.reconcile_options(),
                error_requeue: args.error_requeue(),
            };
            run_controller(client, data).await?;
        }
        Command::Render(args) => {
            let stages = load_stages(&args.assets_dir)?;
            for obj in render_instance(&stages, &args.instance()).await? {
                print!("---\n{}", serde_yaml::to_string(&obj)?);
            }
        }
    }
    Ok(())
}
