// ============================================================
// Layer 4 — Waldo Batcher and Batch Loader
// ============================================================
// WaldoBatcher implements Burn's Batcher trait: it stacks a
// Vec<WaldoItem> into tensors on the configured device.
//
//   images: [batch, 3, size, size]   normalised CHW pixels
//   boxes:  [batch, 4]               normalised xyxy
//   labels: [batch]                  class ids
//
// BatchLoader ties one split together:
//
//   BatchScheduler  → which indices go in the next batch
//   Record Store    → fetch + transform those records
//   WaldoBatcher    → stack them into tensors
//
// A record the store cannot produce, or an item whose shape
// differs from the rest of its batch, aborts the epoch; there
// is no skip-and-continue policy.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use crate::data::{dataset::WaldoItem, scheduler::BatchScheduler};
use crate::domain::error::PipelineError;

// ─── WaldoBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct WaldoBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub boxes:  Tensor<B, 2>,
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> WaldoBatch<B> {
    pub fn len(&self) -> usize {
        self.images.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── WaldoBatcher ─────────────────────────────────────────────────────────────
/// Holds the target device so tensors land on the right GPU/CPU.
#[derive(Clone, Debug)]
pub struct WaldoBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> WaldoBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<WaldoItem, WaldoBatch<B>> for WaldoBatcher<B> {
    /// Callers must pass a non-empty batch of equally sized items;
    /// BatchLoader checks this before calling.
    fn batch(&self, items: Vec<WaldoItem>) -> WaldoBatch<B> {
        let batch_size = items.len();
        let size       = items[0].size;

        let pixels: Vec<f32> = items.iter().flat_map(|i| i.pixels.iter().copied()).collect();
        let boxes:  Vec<f32> = items.iter().flat_map(|i| i.bbox).collect();
        let labels: Vec<i32> = items.iter().map(|i| i.label as i32).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 3, size, size]),
            &self.device,
        );
        let boxes = Tensor::<B, 2>::from_data(
            TensorData::new(boxes, [batch_size, 4]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        WaldoBatch { images, boxes, labels }
    }
}

// ─── BatchLoader ──────────────────────────────────────────────────────────────
pub struct BatchLoader<B: Backend> {
    scheduler: BatchScheduler,
    store:     Arc<dyn Dataset<WaldoItem>>,
    batcher:   WaldoBatcher<B>,
}

impl<B: Backend> BatchLoader<B> {
    pub fn new(
        scheduler: BatchScheduler,
        store:     Arc<dyn Dataset<WaldoItem>>,
        device:    B::Device,
    ) -> Self {
        Self { scheduler, store, batcher: WaldoBatcher::new(device) }
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// One pass over the split, producing tensor batches lazily.
    pub fn epoch(&mut self) -> impl Iterator<Item = Result<WaldoBatch<B>, PipelineError>> + '_ {
        let store   = &self.store;
        let batcher = &self.batcher;
        self.scheduler
            .epoch()
            .map(move |indices| fetch(store.as_ref(), &indices).map(|items| batcher.batch(items)))
    }
}

/// Pull the records for one batch and check they stack cleanly.
fn fetch(store: &dyn Dataset<WaldoItem>, indices: &[usize]) -> Result<Vec<WaldoItem>, PipelineError> {
    let items = indices
        .iter()
        .map(|&i| store.get(i).ok_or(PipelineError::RecordUnavailable(i)))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(first) = items.first() else {
        return Err(PipelineError::MalformedBatch("empty batch".into()));
    };
    let size = first.size;
    for (item, index) in items.iter().zip(indices) {
        if item.size != size || item.pixels.len() != 3 * size * size {
            return Err(PipelineError::MalformedBatch(format!(
                "record {index} has {} values, expected 3x{size}x{size}",
                item.pixels.len()
            )));
        }
    }
    Ok(items)
}
