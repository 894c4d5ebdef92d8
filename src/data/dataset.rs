use std::path::PathBuf;

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::transform::Transformation;
use crate::domain::record::{Annotation, LabelMap};

/// One transformed record, ready to be stacked into a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaldoItem {
    /// CHW pixels, length 3 * size * size
    pub pixels: Vec<f32>,
    /// Side length of the square image
    pub size:   usize,
    /// Normalised xyxy box
    pub bbox:   [f32; 4],
    pub label:  usize,
}

/// Record Store over the annotation table. Images are read and
/// transformed lazily on `get`, so memory stays flat for big sets.
pub struct WaldoDataset {
    rows:           Vec<Annotation>,
    root:           PathBuf,
    labels:         LabelMap,
    transformation: Transformation,
}

impl WaldoDataset {
    pub fn new(rows: Vec<Annotation>, root: impl Into<PathBuf>, transformation: Transformation) -> Self {
        let labels = LabelMap::from_annotations(&rows);
        Self { rows, root: root.into(), labels, transformation }
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn load(&self, row: &Annotation) -> anyhow::Result<WaldoItem> {
        let path = self.root.join(&row.filename);
        let img  = image::open(&path)
            .map_err(|e| anyhow::anyhow!("failed to open image {}: {e}", path.display()))?;

        let label = self
            .labels
            .label(&row.class)
            .ok_or_else(|| anyhow::anyhow!("class '{}' missing from label map", row.class))?;

        Ok(WaldoItem {
            pixels: self.transformation.image(&img),
            size:   self.transformation.size as usize,
            bbox:   self.transformation.bbox(row.bbox(), row.width, row.height).to_array(),
            label,
        })
    }
}

impl Dataset<WaldoItem> for WaldoDataset {
    fn get(&self, index: usize) -> Option<WaldoItem> {
        let row = self.rows.get(index)?;
        match self.load(row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Record {} ('{}') unavailable: {}", index, row.filename, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn row(filename: &str, class: &str) -> Annotation {
        Annotation {
            filename: filename.into(),
            width: 16, height: 8,
            class: class.into(),
            xmin: 4.0, ymin: 2.0, xmax: 8.0, ymax: 6.0,
        }
    }

    #[test]
    fn test_get_loads_and_transforms_lazily() {
        let dir = tempdir().unwrap();
        RgbImage::from_pixel(16, 8, Rgb([10, 20, 30]))
            .save(dir.path().join("a.png"))
            .unwrap();

        let ds = WaldoDataset::new(
            vec![row("a.png", "wizard"), row("missing.png", "waldo")],
            dir.path(),
            Transformation::new(4),
        );
        assert_eq!(ds.len(), 2);

        let item = ds.get(0).unwrap();
        assert_eq!(item.pixels.len(), 3 * 4 * 4);
        assert_eq!(item.bbox, [0.25, 0.25, 0.5, 0.75]);
        assert_eq!(item.label, 1);

        // Unreadable image and out-of-range index are both None
        assert!(ds.get(1).is_none());
        assert!(ds.get(2).is_none());
    }
}
