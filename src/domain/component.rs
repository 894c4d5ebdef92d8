// ============================================================
// Layer 3 — Model Components and Group Policies
// ============================================================
// The localization model is split into four named branches.
// Each branch is optimised with its own (learning rate,
// weight decay) pair:
//
//   classification  1e-6  0.075   small, label-imbalanced head
//   box             1e-3  0.025   trained from scratch
//   base            1e-4  0.025   backbone, coarse adaptation
//   dense           1e-4  0.025   neck, shares the backbone rate
//
// Component names serialise in lowercase so a policy file
// looks like:
//   { "box": { "lr": 0.001, "weight_decay": 0.025 }, ... }
//
// Reference: Rust Book §6 (Enums), serde derive documentation

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A named trainable sub-component of the localization model.
///
/// The derived `Ord` fixes the order groups are built in:
/// classification, box, base, dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Classification,
    Box,
    Base,
    Dense,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Classification,
        Component::Box,
        Component::Base,
        Component::Dense,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Classification => "classification",
            Component::Box            => "box",
            Component::Base           => "base",
            Component::Dense          => "dense",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown model component '{s}'"))
    }
}

/// Learning rate and AdamW weight decay for one parameter group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupPolicy {
    pub lr:           f64,
    pub weight_decay: f32,
}

impl GroupPolicy {
    pub fn new(lr: f64, weight_decay: f32) -> Self {
        Self { lr, weight_decay }
    }
}

/// The reference per-branch policy table.
pub fn default_group_policies() -> BTreeMap<Component, GroupPolicy> {
    BTreeMap::from([
        (Component::Classification, GroupPolicy::new(1e-6, 0.075)),
        (Component::Box,            GroupPolicy::new(1e-3, 0.025)),
        (Component::Base,           GroupPolicy::new(1e-4, 0.025)),
        (Component::Dense,          GroupPolicy::new(1e-4, 0.025)),
    ])
}
