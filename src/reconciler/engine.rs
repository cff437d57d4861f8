// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::crds::RadeonInstance;
use crate::kubernetes_api_objects::resource::{Resource, ResourceBundle};
use crate::reconciler::control::{ControlFunction, ResourceStatus};
use crate::shim_layer::store::ObjectStore;
use crate::Error;
use tracing::*;

/// One step of the convergence sequence: a bundle of descriptors and the
/// control functions that converge them. Control `i` converges descriptor `i`.
#[derive(Debug)]
pub struct Stage {
    bundle: ResourceBundle,
    controls: Vec<Box<dyn ControlFunction>>,
}

impl Stage {
    pub fn new(bundle: ResourceBundle, controls: Vec<Box<dyn ControlFunction>>) -> Stage {
        Stage { bundle, controls }
    }

    pub fn bundle(&self) -> &ResourceBundle {
        &self.bundle
    }

    pub fn controls(&self) -> &[Box<dyn ControlFunction>] {
        &self.controls
    }
}

/// The ordered stage list. Built once at start-up and shared read-only by
/// every reconcile; it does not vary per instance.
#[derive(Debug, Default)]
pub struct StageConfig {
    stages: Vec<Stage>,
}

impl StageConfig {
    pub fn new(stages: Vec<Stage>) -> StageConfig {
        StageConfig { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, idx: usize) -> Option<&Stage> {
        self.stages.get(idx)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Stage> {
        self.stages.iter()
    }

    /// Every descriptor of every stage, in convergence order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.stages.iter().flat_map(|stage| stage.bundle().iter())
    }
}

/// The state of one reconcile pass, handed to every control function.
pub struct EngineState<'a> {
    pub stages: &'a StageConfig,
    pub idx: usize,
    pub store: &'a dyn ObjectStore,
    pub instance: &'a RadeonInstance,
}

impl<'a> EngineState<'a> {
    pub fn current_stage(&self) -> Option<&'a Stage> {
        self.stages.stage(self.idx)
    }

    pub fn instance_namespace(&self) -> Result<&'a str, Error> {
        self.instance
            .metadata
            .namespace
            .as_deref()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))
    }
}

/// Drives the stages of one reconcile pass.
///
/// An engine is created for every reconcile call and dropped at its end, so
/// concurrent passes for different instances never share progress, and every
/// pass starts from the first stage.
pub struct ConvergenceEngine<'a> {
    state: EngineState<'a>,
}

impl<'a> ConvergenceEngine<'a> {
    pub fn init(
        store: &'a dyn ObjectStore,
        stages: &'a StageConfig,
        instance: &'a RadeonInstance,
    ) -> ConvergenceEngine<'a> {
        ConvergenceEngine {
            state: EngineState {
                stages,
                idx: 0,
                store,
                instance,
            },
        }
    }

    pub fn state(&self) -> &EngineState<'a> {
        &self.state
    }

    pub fn stage_index(&self) -> usize {
        self.state.idx
    }

    // step runs every control of the current stage in order and advances to the
    // next stage only if all of them report Ready. The first error or NotReady
    // aborts the stage without running the remaining controls.
    pub async fn step(&mut self) -> Result<(), Error> {
        let idx = self.state.idx;
        let stage = self.state.current_stage().ok_or(Error::EngineFinished)?;
        debug!(stage = idx, controls = stage.controls().len(), "Converging stage");
        for control in stage.controls() {
            let status = control.converge(&self.state).await?;
            if status != ResourceStatus::Ready {
                return Err(Error::ResourceNotReady {
                    stage: idx,
                    control: control.name(),
                });
            }
        }
        self.state.idx = idx + 1;
        debug!(stage = idx, "Stage converged");
        Ok(())
    }

    pub fn done(&self) -> bool {
        self.state.idx == self.state.stages.len()
    }

    /// Steps until every stage has converged or the first failure.
    pub async fn run(&mut self) -> Result<(), Error> {
        while !self.done() {
            self.step().await?;
        }
        Ok(())
    }
}
