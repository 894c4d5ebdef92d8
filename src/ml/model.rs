use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::domain::{component::Component, traits::Branched};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct WaldoModelConfig {
    pub num_classes: usize,
    #[config(default = 16)]
    pub base_channels: usize,
    #[config(default = 64)]
    pub hidden: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl WaldoModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> WaldoModel<B> {
        let c = self.base_channels;

        let base = Backbone {
            conv1: Conv2dConfig::new([3, c], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            conv2: Conv2dConfig::new([c, 2 * c], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            gap:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        };
        let dense = Neck {
            linear:  LinearConfig::new(2 * c, self.hidden).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        };
        let classification = LinearConfig::new(self.hidden, self.num_classes).init(device);
        let bbox = BoxHead { linear: LinearConfig::new(self.hidden, 4).init(device) };

        WaldoModel { base, dense, classification, bbox }
    }
}

/// Feature extractor: two conv blocks, then global average pooling.
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub pool:  MaxPool2d,
    pub gap:   AdaptiveAvgPool2d,
}

impl<B: Backend> Backbone<B> {
    /// images: [batch, 3, h, w] → features: [batch, 2 * base_channels]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.gap.forward(relu(self.conv2.forward(x)));
        x.flatten::<2>(1, 3)
    }
}

#[derive(Module, Debug)]
pub struct Neck<B: Backend> {
    pub linear:  Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> Neck<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.dropout.forward(relu(self.linear.forward(x)))
    }
}

/// Regresses one normalised xyxy box per image.
#[derive(Module, Debug)]
pub struct BoxHead<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> BoxHead<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.linear.forward(x))
    }
}

/// The four branches are separate fields so each one can be
/// handed to its own optimiser.
#[derive(Module, Debug)]
pub struct WaldoModel<B: Backend> {
    pub base:           Backbone<B>,
    pub dense:          Neck<B>,
    pub classification: Linear<B>,
    pub bbox:           BoxHead<B>,
}

pub struct WaldoOutput<B: Backend> {
    pub class_logits: Tensor<B, 2>,
    pub boxes:        Tensor<B, 2>,
}

impl<B: Backend> WaldoModel<B> {
    /// images: [batch, 3, h, w] → logits [batch, classes], boxes [batch, 4]
    pub fn forward(&self, images: Tensor<B, 4>) -> WaldoOutput<B> {
        let features = self.dense.forward(self.base.forward(images));
        WaldoOutput {
            class_logits: self.classification.forward(features.clone()),
            boxes:        self.bbox.forward(features),
        }
    }
}

impl<B: Backend> Branched for WaldoModel<B> {
    fn branches(&self) -> Vec<(Component, usize)> {
        vec![
            (Component::Classification, self.classification.num_params()),
            (Component::Box,            self.bbox.num_params()),
            (Component::Base,           self.base.num_params()),
            (Component::Dense,          self.dense.num_params()),
        ]
    }

    fn total_params(&self) -> usize {
        self.num_params()
    }
}
