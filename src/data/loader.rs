// ============================================================
// Layer 4 — Annotation Loader
// ============================================================
// Reads the annotation table (waldo.csv) with the csv crate.
// Each row is deserialised straight into an Annotation via
// serde, then validated.
//
// Failure policy:
//   - missing / unreadable file   → error (nothing to train on)
//   - a malformed or invalid row  → error naming the row
//   - an empty table              → EmptyAnnotations
//
// Skipping bad rows would silently change N and therefore
// every split size, so every problem is fatal here.
//
// Reference: csv crate documentation (serde deserialisation)

use anyhow::{Context, Result};
use std::{
    fs::File,
    path::{Path, PathBuf},
};

use crate::domain::{error::PipelineError, record::Annotation, traits::AnnotationSource};

/// Loads annotation rows from a CSV file with a header line.
pub struct CsvAnnotationLoader {
    path: PathBuf,
}

impl CsvAnnotationLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory that image filenames are resolved against.
    pub fn image_root(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AnnotationSource for CsvAnnotationLoader {
    fn load_all(&self) -> Result<Vec<Annotation>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open annotations '{}'", self.path.display()))?;

        let mut reader = csv::Reader::from_reader(file);
        let mut rows   = Vec::new();

        for (i, result) in reader.deserialize::<Annotation>().enumerate() {
            // Row numbers are 1-based and skip the header, like a spreadsheet
            let row = i + 2;
            let annotation = result.map_err(|e| PipelineError::InvalidAnnotation {
                row,
                reason: e.to_string(),
            })?;
            annotation
                .validate()
                .map_err(|reason| PipelineError::InvalidAnnotation { row, reason })?;
            rows.push(annotation);
        }

        if rows.is_empty() {
            return Err(PipelineError::EmptyAnnotations(self.path.display().to_string()).into());
        }

        tracing::info!("Loaded {} annotations from '{}'", rows.len(), self.path.display());
        Ok(rows)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "filename,width,height,class,xmin,ymin,xmax,ymax\n";

    #[test]
    fn test_loads_rows_in_file_order() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("waldo.csv");
        fs::write(
            &path,
            format!("{HEADER}1.jpg,200,100,waldo,10,10,30,40\n2.jpg,200,100,waldo,50,20,60,30\n"),
        )
        .unwrap();

        let loader = CsvAnnotationLoader::new(&path);
        let rows   = loader.load_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].filename, "1.jpg");
        assert_eq!(rows[1].xmin, 50.0);
        assert_eq!(loader.image_root(), dir.path());
    }

    #[test]
    fn test_empty_table_is_a_configuration_error() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("waldo.csv");
        fs::write(&path, HEADER).unwrap();

        let err = CsvAnnotationLoader::new(&path).load_all().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyAnnotations(_))
        ));
    }

    #[test]
    fn test_invalid_row_is_reported_with_its_row_number() {
        let dir  = tempdir().unwrap();
        let path = dir.path().join("waldo.csv");
        fs::write(
            &path,
            format!("{HEADER}1.jpg,200,100,waldo,10,10,30,40\n2.jpg,200,100,waldo,90,20,60,30\n"),
        )
        .unwrap();

        let err = CsvAnnotationLoader::new(&path).load_all().unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::InvalidAnnotation { row, .. }) => assert_eq!(*row, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(CsvAnnotationLoader::new("does/not/exist.csv").load_all().is_err());
    }
}
