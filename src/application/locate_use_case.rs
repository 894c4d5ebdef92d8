// ============================================================
// Layer 2 — Locate Use Case
// ============================================================
// Loads a trained model from a state directory and predicts
// the class and pixel-space box for a single image.

use anyhow::{Context, Result};
use std::path::Path;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    device::{select_device, InferBackend},
    inferencer::{Location, Locator},
};

pub struct LocateUseCase {
    locator: Locator<InferBackend>,
}

impl LocateUseCase {
    pub fn new(state_dir: &str) -> Result<Self> {
        let ckpt    = CheckpointManager::new(state_dir);
        let device  = select_device();
        let locator = Locator::from_checkpoint(&ckpt, &device)?;
        Ok(Self { locator })
    }

    pub fn locate(&self, image: &Path) -> Result<Location> {
        let img = image::open(image)
            .with_context(|| format!("Cannot open image '{}'", image.display()))?;
        self.locator.locate(&img)
    }
}
