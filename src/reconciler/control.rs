// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::reconciler::engine::EngineState;
use crate::Error;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Ready,
    NotReady,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Ready => f.write_str("Ready"),
            ResourceStatus::NotReady => f.write_str("NotReady"),
        }
    }
}

/// A control function converges one sub-resource of the current stage
/// against the backing store.
///
/// It must be idempotent: the engine re-runs every control of every earlier
/// stage on each reconcile. An `Err` means the resource is not ready and
/// carries the reason; `Ok(ResourceStatus::NotReady)` means the control
/// finished cleanly but judged the resource not converged yet.
#[async_trait]
pub trait ControlFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> String;

    async fn converge(&self, state: &EngineState<'_>) -> Result<ResourceStatus, Error>;
}
