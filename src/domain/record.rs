// ============================================================
// Layer 3 — Annotation Record Types
// ============================================================
// One row of the annotation table describes one image and
// where Waldo is in it:
//
//   filename,width,height,class,xmin,ymin,xmax,ymax
//   1.jpg,2048,1251,waldo,706,513,743,562
//
// Box coordinates are pixels in the ORIGINAL image. They are
// normalised to [0, 1] later, by the transformation step,
// because the image itself is resized.
//
// Reference: Rust Book §5 (Structs and Methods)

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single row of the annotation CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Image path, relative to the annotation file's directory
    pub filename: String,
    pub width:    u32,
    pub height:   u32,
    pub class:    String,
    pub xmin:     f32,
    pub ymin:     f32,
    pub xmax:     f32,
    pub ymax:     f32,
}

impl Annotation {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    /// Check that the box is non-empty and lies inside the image.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("'{}' has zero image size", self.filename));
        }
        if self.xmin >= self.xmax || self.ymin >= self.ymax {
            return Err(format!("'{}' has an empty or inverted box", self.filename));
        }
        if self.xmin < 0.0
            || self.ymin < 0.0
            || self.xmax > self.width as f32
            || self.ymax > self.height as f32
        {
            return Err(format!(
                "'{}' box [{}, {}, {}, {}] lies outside {}x{}",
                self.filename, self.xmin, self.ymin, self.xmax, self.ymax,
                self.width, self.height,
            ));
        }
        Ok(())
    }
}

/// Axis-aligned box in xyxy order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Scale each axis, e.g. pixels → [0, 1] with (1/w, 1/h).
    pub fn scale(self, sx: f32, sy: f32) -> Self {
        Self::new(self.xmin * sx, self.ymin * sy, self.xmax * sx, self.ymax * sy)
    }

    pub fn area(&self) -> f32 {
        let w = (self.xmax - self.xmin).max(0.0);
        let h = (self.ymax - self.ymin).max(0.0);
        w * h
    }

    /// Intersection over union. Corners may arrive unordered from
    /// an untrained box head, so they are sorted first.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let a = self.ordered();
        let b = other.ordered();

        let inter = BoundingBox::new(
            a.xmin.max(b.xmin),
            a.ymin.max(b.ymin),
            a.xmax.min(b.xmax),
            a.ymax.min(b.ymax),
        )
        .area();

        let denom = a.area() + b.area() - inter;
        if denom <= 0.0 { 0.0 } else { inter / denom }
    }

    fn ordered(&self) -> BoundingBox {
        BoundingBox::new(
            self.xmin.min(self.xmax),
            self.ymin.min(self.ymax),
            self.xmin.max(self.xmax),
            self.ymin.max(self.ymax),
        )
    }
}

/// Dense mapping between class names and integer labels.
/// Labels are assigned in sorted name order so the same
/// annotation table always yields the same mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn from_annotations(rows: &[Annotation]) -> Self {
        let names: BTreeSet<&str> = rows.iter().map(|r| r.class.as_str()).collect();
        Self { names: names.into_iter().map(str::to_string).collect() }
    }

    pub fn label(&self, class: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(class)).ok()
    }

    pub fn name(&self, label: usize) -> Option<&str> {
        self.names.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
