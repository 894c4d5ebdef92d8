// ============================================================
// Layer 5 — Training Objective
// ============================================================
// The seam between the epoch loop and the loss math. The
// trainer only needs two things:
//
//   loss()     — a differentiable scalar for one training batch
//   evaluate() — loss / accuracy / IoU sums for one eval batch,
//                computed on the inner (non-autodiff) backend
//
// DetectionObjective is the default:
//
//   loss = CE(class_logits, labels) + box_weight * MSE(boxes, gt)
//
// Anything implementing Objective can replace it, e.g. a
// constant-loss stub in tests.
//
// Reference: Burn Book §5 (Training), burn::nn::loss

use burn::{
    nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::WaldoBatch;
use crate::domain::{history::SplitMetrics, record::BoundingBox};
use crate::ml::model::{WaldoModel, WaldoOutput};

pub trait Objective<B: AutodiffBackend> {
    /// Scalar training loss for one batch, still attached to the graph.
    fn loss(&self, model: &WaldoModel<B>, batch: WaldoBatch<B>) -> Tensor<B, 1>;

    /// Forward-only statistics for one evaluation batch.
    fn evaluate(
        &self,
        model: &WaldoModel<B::InnerBackend>,
        batch: WaldoBatch<B::InnerBackend>,
    ) -> BatchStats;
}

// ─── BatchStats ───────────────────────────────────────────────────────────────
/// Running sums over an evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchStats {
    pub batches:  usize,
    pub samples:  usize,
    pub loss_sum: f64,
    pub correct:  usize,
    pub iou_sum:  f64,
}

impl BatchStats {
    pub fn merge(&mut self, other: BatchStats) {
        self.batches  += other.batches;
        self.samples  += other.samples;
        self.loss_sum += other.loss_sum;
        self.correct  += other.correct;
        self.iou_sum  += other.iou_sum;
    }

    /// Averages; an empty split yields None for every metric.
    pub fn finish(&self) -> SplitMetrics {
        let per_sample = |sum: f64| (self.samples > 0).then(|| sum / self.samples as f64);
        SplitMetrics {
            samples:  self.samples,
            loss:     (self.batches > 0).then(|| self.loss_sum / self.batches as f64),
            accuracy: per_sample(self.correct as f64),
            mean_iou: per_sample(self.iou_sum),
        }
    }
}

// ─── DetectionObjective ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct DetectionObjective {
    pub box_weight: f64,
}

impl Default for DetectionObjective {
    fn default() -> Self {
        Self { box_weight: 1.0 }
    }
}

impl DetectionObjective {
    fn combined<B: Backend>(&self, out: &WaldoOutput<B>, batch: &WaldoBatch<B>) -> Tensor<B, 1> {
        let ce = CrossEntropyLossConfig::new()
            .init(&out.class_logits.device())
            .forward(out.class_logits.clone(), batch.labels.clone());
        let mse = MseLoss::new().forward(out.boxes.clone(), batch.boxes.clone(), Reduction::Mean);
        ce + mse.mul_scalar(self.box_weight)
    }
}

impl<B: AutodiffBackend> Objective<B> for DetectionObjective {
    fn loss(&self, model: &WaldoModel<B>, batch: WaldoBatch<B>) -> Tensor<B, 1> {
        let out = model.forward(batch.images.clone());
        self.combined(&out, &batch)
    }

    fn evaluate(
        &self,
        model: &WaldoModel<B::InnerBackend>,
        batch: WaldoBatch<B::InnerBackend>,
    ) -> BatchStats {
        let out  = model.forward(batch.images.clone());
        let loss = self.combined(&out, &batch).into_scalar().elem::<f64>();

        // argmax(1) returns [batch, 1] — flatten to [batch] before comparing
        let predicted = out.class_logits.argmax(1).flatten::<1>(0, 1);
        let correct: i64 = predicted
            .equal(batch.labels.clone())
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        BatchStats {
            batches:  1,
            samples:  batch.len(),
            loss_sum: loss,
            correct:  correct as usize,
            iou_sum:  iou_sum(out.boxes, batch.boxes),
        }
    }
}

/// Sum of per-row IoU between two [batch, 4] box tensors.
pub fn iou_sum<B: Backend>(predicted: Tensor<B, 2>, target: Tensor<B, 2>) -> f64 {
    let p = predicted.into_data().to_vec::<f32>().unwrap_or_default();
    let t = target.into_data().to_vec::<f32>().unwrap_or_default();
    p.chunks_exact(4)
        .zip(t.chunks_exact(4))
        .map(|(a, b)| {
            let a = BoundingBox::new(a[0], a[1], a[2], a[3]);
            let b = BoundingBox::new(b[0], b[1], b[2], b[3]);
            a.iou(&b) as f64
        })
        .sum()
}
