// ============================================================
// Layer 5 — Locator
// ============================================================
// Runs a trained model on a single image:
//
//   image ─► Transformation ─► [1, 3, s, s] ─► model
//                                               │
//        class_logits ─► softmax ─► best class + confidence
//        boxes (0..1)  ─► scaled back to ORIGINAL pixel size
//
// Forward-only, so it runs on the inner (non-autodiff)
// backend with dropout disabled.
//
// Reference: Burn Book §5 (Inference)

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::softmax};
use image::DynamicImage;

use crate::data::transform::Transformation;
use crate::domain::record::{BoundingBox, LabelMap};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::WaldoModel;

/// One prediction in source-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub class:      String,
    pub confidence: f32,
    pub bbox:       BoundingBox,
}

pub struct Locator<B: Backend> {
    model:          WaldoModel<B>,
    labels:         LabelMap,
    transformation: Transformation,
    device:         B::Device,
}

impl<B: Backend> Locator<B> {
    pub fn new(
        model:          WaldoModel<B>,
        labels:         LabelMap,
        transformation: Transformation,
        device:         B::Device,
    ) -> Self {
        Self { model, labels, transformation, device }
    }

    /// Rebuild model, label map and image size from a state dir.
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: &B::Device) -> Result<Self> {
        let snapshot = ckpt.load_snapshot()?;
        let model    = ckpt.load_model::<B>(&snapshot, device)?;
        tracing::info!(
            "Model loaded from '{}' ({} epochs, {} classes)",
            ckpt.dir().display(),
            snapshot.epochs_completed,
            snapshot.labels.len(),
        );
        Ok(Self::new(
            model,
            snapshot.labels,
            Transformation::new(snapshot.image_size),
            device.clone(),
        ))
    }

    pub fn locate(&self, img: &DynamicImage) -> Result<Location> {
        let size   = self.transformation.size as usize;
        let pixels = self.transformation.image(img);
        let input  = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [1, 3, size, size]),
            &self.device,
        );

        let out   = self.model.forward(input);
        let probs = to_vec(softmax(out.class_logits, 1))?;
        let boxes = to_vec(out.boxes)?;

        let (label, confidence) = probs
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| anyhow!("model produced no class scores"))?;
        let class = self
            .labels
            .name(label)
            .ok_or_else(|| anyhow!("predicted label {label} is not in the label map"))?
            .to_string();

        let (w, h) = (img.width() as f32, img.height() as f32);
        let bbox   = BoundingBox::new(boxes[0], boxes[1], boxes[2], boxes[3]).scale(w, h);

        tracing::debug!("Located '{}' conf={:.4} box={:?}", class, confidence, bbox);
        Ok(Location { class, confidence, bbox })
    }
}

fn to_vec<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read tensor: {e:?}"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Annotation;
    use crate::ml::model::WaldoModelConfig;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn labels() -> LabelMap {
        let row = |class: &str| Annotation {
            filename: "a.png".into(),
            width:    10,
            height:   10,
            class:    class.into(),
            xmin:     0.0,
            ymin:     0.0,
            xmax:     1.0,
            ymax:     1.0,
        };
        LabelMap::from_annotations(&[row("waldo"), row("wenda")])
    }

    fn locator() -> Locator<TestBackend> {
        let device = Default::default();
        let model  = WaldoModelConfig::new(2)
            .with_base_channels(2)
            .with_hidden(4)
            .init::<TestBackend>(&device);
        Locator::new(model, labels(), Transformation::new(8), device)
    }

    #[test]
    fn test_locate_returns_known_class() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([200, 10, 10])));
        let loc = locator().locate(&img).unwrap();
        assert!(loc.class == "waldo" || loc.class == "wenda");
        assert!(loc.confidence >= 0.5 && loc.confidence <= 1.0);
    }

    #[test]
    fn test_box_is_in_source_pixels() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([0, 0, 0])));
        let loc = locator().locate(&img).unwrap();
        let b   = loc.bbox.to_array();
        // sigmoid output scaled by 40 × 20
        assert!(b[0] >= 0.0 && b[0] <= 40.0);
        assert!(b[2] >= 0.0 && b[2] <= 40.0);
        assert!(b[1] >= 0.0 && b[1] <= 20.0);
        assert!(b[3] >= 0.0 && b[3] <= 20.0);
    }
}
