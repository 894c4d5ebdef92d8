// ============================================================
// Layer 5 — Parameter Groups and Per-Branch Optimisers
// ============================================================
// Differential learning rates: every named branch of the model
// gets its own (lr, weight_decay) policy.
//
// Step 1 — build_parameter_groups()
//   Pure check of model vs policy table. Every branch the model
//   exposes needs a policy, and every policy must name a branch
//   the model has. Either mismatch is a fatal configuration
//   error.
//
// Step 2 — GroupOptimizers
//   One AdamW per branch, with that branch's weight decay. On
//   each step the gradients are partitioned per branch with
//   GradientsParams::from_module, and each branch is updated
//   with its own learning rate. Branches are distinct struct
//   fields, so the groups are disjoint by construction.
//
// Reference: Burn Book §5 (Optimizers), Loshchilov & Hutter (2019) AdamW

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    nn::Linear,
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsParams, Optimizer},
    record::Recorder,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::domain::{
    component::{Component, GroupPolicy},
    error::PipelineError,
    traits::Branched,
};
use crate::infra::checkpoint::StateRecorder;
use crate::ml::model::{Backbone, BoxHead, Neck, WaldoModel};

/// A named slice of the model's weights and how to optimise it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub component:  Component,
    pub policy:     GroupPolicy,
    pub num_params: usize,
}

/// The complete, validated set of groups, one per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterGroups {
    groups: Vec<ParameterGroup>,
}

impl ParameterGroups {
    pub fn iter(&self) -> impl Iterator<Item = &ParameterGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, component: Component) -> Option<&ParameterGroup> {
        self.groups.iter().find(|g| g.component == component)
    }

    pub fn policy(&self, component: Component) -> Result<GroupPolicy, PipelineError> {
        self.get(component)
            .map(|g| g.policy)
            .ok_or(PipelineError::MissingPolicy(component))
    }

    pub fn total_params(&self) -> usize {
        self.groups.iter().map(|g| g.num_params).sum()
    }
}

/// Pair every model branch with its policy.
pub fn build_parameter_groups<M: Branched>(
    model:    &M,
    policies: &BTreeMap<Component, GroupPolicy>,
) -> Result<ParameterGroups, PipelineError> {
    let branches = model.branches();

    for component in policies.keys() {
        if !branches.iter().any(|(c, _)| c == component) {
            return Err(PipelineError::MissingComponent(*component));
        }
    }

    let mut groups = branches
        .into_iter()
        .map(|(component, num_params)| {
            let policy = *policies
                .get(&component)
                .ok_or(PipelineError::MissingPolicy(component))?;
            Ok(ParameterGroup { component, policy, num_params })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;
    groups.sort_by_key(|g| g.component);
    let groups = ParameterGroups { groups };

    for g in groups.iter() {
        tracing::info!(
            "Parameter group '{}': {} params, lr={:e}, weight_decay={}",
            g.component, g.num_params, g.policy.lr, g.policy.weight_decay
        );
    }
    if groups.total_params() != model.total_params() {
        tracing::warn!(
            "{} of {} parameters belong to no group and will not be trained",
            model.total_params() - groups.total_params().min(model.total_params()),
            model.total_params()
        );
    }

    Ok(groups)
}

// ─── GroupOptimizers ──────────────────────────────────────────────────────────
type GroupOptim<B, M> = OptimizerAdaptor<AdamW<<B as AutodiffBackend>::InnerBackend>, M, B>;

/// A branch's optimiser plus the learning rate it steps with.
struct Slot<B: AutodiffBackend, M: AutodiffModule<B>> {
    lr:    f64,
    optim: GroupOptim<B, M>,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Slot<B, M> {
    fn new(policy: GroupPolicy) -> Self {
        let optim = AdamWConfig::new()
            .with_weight_decay(policy.weight_decay)
            .init();
        Self { lr: policy.lr, optim }
    }

    fn step(&mut self, module: M, grads: &mut B::Gradients) -> M {
        let params = GradientsParams::from_module(grads, &module);
        self.optim.step(self.lr, module, params)
    }

    fn save(&self, path: &Path) -> Result<()> {
        StateRecorder::new()
            .record(self.optim.to_record(), path.to_path_buf())
            .with_context(|| format!("Failed to save optimiser state to '{}'", path.display()))
    }
}

pub struct GroupOptimizers<B: AutodiffBackend> {
    classification: Slot<B, Linear<B>>,
    bbox:           Slot<B, BoxHead<B>>,
    base:           Slot<B, Backbone<B>>,
    dense:          Slot<B, Neck<B>>,
}

impl<B: AutodiffBackend> GroupOptimizers<B> {
    pub fn new(groups: &ParameterGroups) -> Result<Self, PipelineError> {
        Ok(Self {
            classification: Slot::new(groups.policy(Component::Classification)?),
            bbox:           Slot::new(groups.policy(Component::Box)?),
            base:           Slot::new(groups.policy(Component::Base)?),
            dense:          Slot::new(groups.policy(Component::Dense)?),
        })
    }

    /// Apply one optimiser step to every branch.
    pub fn step(&mut self, model: WaldoModel<B>, mut grads: B::Gradients) -> WaldoModel<B> {
        let WaldoModel { base, dense, classification, bbox } = model;
        WaldoModel {
            classification: self.classification.step(classification, &mut grads),
            bbox:           self.bbox.step(bbox, &mut grads),
            base:           self.base.step(base, &mut grads),
            dense:          self.dense.step(dense, &mut grads),
        }
    }

    /// Write one record per branch into `dir`; returns the file
    /// stem used for each component.
    pub fn save(&self, dir: &Path) -> Result<BTreeMap<Component, String>> {
        let mut files = BTreeMap::new();
        for component in Component::ALL {
            let stem = format!("optimizer-{component}");
            let path = dir.join(&stem);
            match component {
                Component::Classification => self.classification.save(&path)?,
                Component::Box            => self.bbox.save(&path)?,
                Component::Base           => self.base.save(&path)?,
                Component::Dense          => self.dense.save(&path)?,
            }
            files.insert(component, stem);
        }
        Ok(files)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::component::default_group_policies;
    use crate::ml::model::WaldoModelConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Module;
    use burn::prelude::*;

    type TestBackend = Autodiff<NdArray<f32>>;

    /// A model that forgot its neck.
    struct ThreeBranches;

    impl Branched for ThreeBranches {
        fn branches(&self) -> Vec<(Component, usize)> {
            vec![
                (Component::Classification, 10),
                (Component::Box, 20),
                (Component::Base, 30),
            ]
        }

        fn total_params(&self) -> usize {
            60
        }
    }

    fn weights(linear: &Linear<TestBackend>) -> Vec<f32> {
        linear.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    fn model() -> WaldoModel<TestBackend> {
        WaldoModelConfig::new(2).with_base_channels(2).with_hidden(4)
            .init::<TestBackend>(&Default::default())
    }

    #[test]
    fn test_four_groups_with_reference_policies() {
        let m      = model();
        let groups = build_parameter_groups(&m, &default_group_policies()).unwrap();
        assert_eq!(groups.len(), 4);

        let cls = groups.get(Component::Classification).unwrap();
        assert_eq!(cls.policy, GroupPolicy::new(1e-6, 0.075));
        assert_eq!(cls.num_params, m.classification.num_params());

        assert_eq!(groups.get(Component::Box).unwrap().num_params,   m.bbox.num_params());
        assert_eq!(groups.get(Component::Base).unwrap().num_params,  m.base.num_params());
        assert_eq!(groups.get(Component::Dense).unwrap().num_params, m.dense.num_params());
    }

    #[test]
    fn test_groups_partition_all_parameters() {
        let m      = model();
        let groups = build_parameter_groups(&m, &default_group_policies()).unwrap();

        // Union equals the full set with no duplicates
        assert_eq!(groups.total_params(), m.num_params());

        let mut seen: Vec<Component> = groups.iter().map(|g| g.component).collect();
        seen.dedup();
        assert_eq!(seen, Component::ALL.to_vec());
    }

    #[test]
    fn test_model_missing_a_branch_is_fatal() {
        let err = build_parameter_groups(&ThreeBranches, &default_group_policies()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingComponent(Component::Dense)));
    }

    #[test]
    fn test_branch_without_policy_is_fatal() {
        let mut policies = default_group_policies();
        policies.remove(&Component::Box);
        let err = build_parameter_groups(&model(), &policies).unwrap_err();
        assert!(matches!(err, PipelineError::MissingPolicy(Component::Box)));
    }

    #[test]
    fn test_step_moves_only_branches_with_a_learning_rate() {
        let device = Default::default();
        let m      = model();

        // Freeze everything except the box head
        let mut policies = default_group_policies();
        for c in [Component::Classification, Component::Base, Component::Dense] {
            policies.insert(c, GroupPolicy::new(0.0, 0.0));
        }
        let groups    = build_parameter_groups(&m, &policies).unwrap();
        let mut optim = GroupOptimizers::<TestBackend>::new(&groups).unwrap();

        let before_box = weights(&m.bbox.linear);
        let before_cls = weights(&m.classification);

        let images = Tensor::<TestBackend, 4>::ones([2, 3, 4, 4], &device);
        let out    = m.forward(images);
        let loss   = out.boxes.sum() + out.class_logits.sum();
        let m      = optim.step(m, loss.backward());

        assert_ne!(weights(&m.bbox.linear), before_box);
        assert_eq!(weights(&m.classification), before_cls);
    }
}
