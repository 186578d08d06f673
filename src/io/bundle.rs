//! Model bundle: the fitted pipeline, the forest and the text-embedder identifier.
//!
//! The three artifacts are only valid together: the forest's split features index
//! into the exact fused layout produced by this pipeline and this embedder. On
//! disk a bundle is a directory:
//!
//! - `preprocessing_pipeline.json`: fitted `FeaturePipeline`
//! - `salary_model.json`: fitted `RandomForest`
//! - `text_embedder.txt`: embedder identifier (one line)
//! - `manifest.json`: format version, widths, feature names, sha256 per artifact
//!
//! `load_bundle` refuses anything it cannot vouch for (missing file, bad JSON,
//! checksum or version mismatch, a structurally broken forest, inconsistent
//! widths or feature names) with a `LoadError`. A half-loaded bundle is never
//! returned.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::confidence::heuristic_band;
use crate::domain::{FeatureVector, PredictionResult, RawRecord};
use crate::error::AppError;
use crate::features::{
    FeatureLayout, FeaturePipeline, TextEmbedder, embed_description, embedder_from_identifier, fuse, fuse_matrix,
    normalize_description,
};
use crate::models::{PredictionModel, Regressor};

pub const PIPELINE_FILE: &str = "preprocessing_pipeline.json";
pub const MODEL_FILE: &str = "salary_model.json";
pub const EMBEDDER_FILE: &str = "text_embedder.txt";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bumped whenever the on-disk layout of any artifact changes.
pub const FORMAT_VERSION: u32 = 1;

/// Version reported by the health endpoint.
pub const MODEL_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub crate_version: String,
    pub trained_at: DateTime<Utc>,
    pub embedder_id: String,
    pub tabular_width: usize,
    pub text_width: usize,
    pub feature_names: Vec<String>,
    /// Artifact file name -> lowercase hex sha256.
    pub checksums: BTreeMap<String, String>,
}

/// Loaded once, then shared read-only.
pub struct ModelBundle {
    pipeline: FeaturePipeline,
    model: PredictionModel,
    embedder: Box<dyn TextEmbedder>,
    layout: FeatureLayout,
    trained_at: DateTime<Utc>,
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("embedder", &self.embedder.identifier())
            .field("layout", &self.layout)
            .field("n_trees", &self.model.n_trees())
            .field("trained_at", &self.trained_at)
            .finish()
    }
}

impl ModelBundle {
    /// Assemble a bundle, checking that the model was fit on this layout.
    pub fn new(
        pipeline: FeaturePipeline,
        model: PredictionModel,
        embedder: Box<dyn TextEmbedder>,
    ) -> Result<Self, AppError> {
        let layout = FeatureLayout::new(pipeline.width(), embedder.dim());
        if layout.total_width() != model.n_features() {
            return Err(AppError::dimension(format!(
                "Pipeline ({}) + embedder ({}) produce {} features, but the model expects {}.",
                layout.tabular_width,
                layout.text_width,
                layout.total_width(),
                model.n_features()
            )));
        }
        Ok(Self {
            pipeline,
            model,
            embedder,
            layout,
            trained_at: Utc::now(),
        })
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &PredictionModel {
        &self.model
    }

    pub fn embedder(&self) -> &dyn TextEmbedder {
        self.embedder.as_ref()
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Raw record -> fused feature vector.
    pub fn features(&self, record: &RawRecord) -> Result<FeatureVector, AppError> {
        let tabular = self.pipeline.transform(record)?;
        let text = embed_description(self.embedder.as_ref(), record.description.as_deref());
        fuse(&self.layout, &tabular, &text)
    }

    /// Point estimate plus the ±10% serving band.
    pub fn predict(&self, record: &RawRecord) -> Result<PredictionResult, AppError> {
        let features = self.features(record)?;
        let point_estimate = self.model.predict(&features)?;
        Ok(PredictionResult {
            point_estimate,
            interval: heuristic_band(point_estimate),
        })
    }

    /// Fused matrix for a batch of records (evaluation).
    pub fn feature_matrix(&self, records: &[RawRecord]) -> Result<DMatrix<f64>, AppError> {
        encode_records(&self.pipeline, self.embedder.as_ref(), records)
    }

    /// Run an all-zero vector of the expected width through the model.
    ///
    /// Proves the model is loaded and callable; says nothing about accuracy.
    pub fn smoke_test(&self) -> Result<f64, AppError> {
        self.model.predict(&FeatureVector::zeros(self.model.n_features()))
    }

    fn manifest(&self, checksums: BTreeMap<String, String>) -> Manifest {
        Manifest {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: self.trained_at,
            embedder_id: self.embedder.identifier(),
            tabular_width: self.layout.tabular_width,
            text_width: self.layout.text_width,
            feature_names: self.pipeline.feature_names(),
            checksums,
        }
    }
}

/// Transform, embed (in parallel) and fuse a batch of records.
pub fn encode_records(
    pipeline: &FeaturePipeline,
    embedder: &dyn TextEmbedder,
    records: &[RawRecord],
) -> Result<DMatrix<f64>, AppError> {
    let layout = FeatureLayout::new(pipeline.width(), embedder.dim());
    let tabular = pipeline.transform_batch(records)?;
    let normalized: Vec<String> = records
        .iter()
        .map(|r| normalize_description(r.description.as_deref()))
        .collect();
    let texts: Vec<&str> = normalized.iter().map(String::as_str).collect();
    let text = embedder.encode_batch(&texts);
    fuse_matrix(&layout, &tabular, &text)
}

/// Write all artifacts plus the manifest into `dir` (created if needed).
pub fn save_bundle(bundle: &ModelBundle, dir: &Path) -> Result<Manifest, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::io(format!("Failed to create artifact dir '{}': {e}", dir.display())))?;

    let pipeline = serde_json::to_vec_pretty(&bundle.pipeline)
        .map_err(|e| AppError::io(format!("Failed to serialize pipeline: {e}")))?;
    let model = serde_json::to_vec(&bundle.model)
        .map_err(|e| AppError::io(format!("Failed to serialize model: {e}")))?;
    let embedder = format!("{}\n", bundle.embedder.identifier()).into_bytes();

    let mut checksums = BTreeMap::new();
    for (name, bytes) in [(PIPELINE_FILE, &pipeline), (MODEL_FILE, &model), (EMBEDDER_FILE, &embedder)] {
        write_file(&dir.join(name), bytes)?;
        checksums.insert(name.to_string(), sha256_hex(bytes));
    }

    let manifest = bundle.manifest(checksums);
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| AppError::io(format!("Failed to serialize manifest: {e}")))?;
    write_file(&dir.join(MANIFEST_FILE), &manifest_bytes)?;

    info!(dir = %dir.display(), embedder = %manifest.embedder_id, "saved model bundle");
    Ok(manifest)
}

/// Load and cross-check a bundle directory.
pub fn load_bundle(dir: &Path) -> Result<ModelBundle, AppError> {
    let manifest_bytes = read_artifact(dir, MANIFEST_FILE)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| AppError::load(format!("Corrupt {MANIFEST_FILE}: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(AppError::load(format!(
            "Unsupported bundle format version {} (this build reads {FORMAT_VERSION}).",
            manifest.format_version
        )));
    }
    if manifest.crate_version != env!("CARGO_PKG_VERSION") {
        debug!(saved_by = %manifest.crate_version, "bundle written by a different crate version");
    }

    let pipeline_bytes = read_verified(dir, PIPELINE_FILE, &manifest)?;
    let model_bytes = read_verified(dir, MODEL_FILE, &manifest)?;
    let embedder_bytes = read_verified(dir, EMBEDDER_FILE, &manifest)?;

    let pipeline: FeaturePipeline = serde_json::from_slice(&pipeline_bytes)
        .map_err(|e| AppError::load(format!("Corrupt {PIPELINE_FILE}: {e}")))?;
    let model: PredictionModel = serde_json::from_slice(&model_bytes)
        .map_err(|e| AppError::load(format!("Corrupt {MODEL_FILE}: {e}")))?;
    model.validate()?;
    let embedder_id = String::from_utf8(embedder_bytes)
        .map_err(|e| AppError::load(format!("Corrupt {EMBEDDER_FILE}: {e}")))?;
    let embedder = embedder_from_identifier(&embedder_id)?;

    if embedder.identifier() != manifest.embedder_id {
        return Err(AppError::load(format!(
            "Embedder '{}' does not match manifest '{}'.",
            embedder.identifier(),
            manifest.embedder_id
        )));
    }
    if pipeline.width() != manifest.tabular_width || embedder.dim() != manifest.text_width {
        return Err(AppError::load(format!(
            "Artifact widths ({} + {}) do not match manifest ({} + {}).",
            pipeline.width(),
            embedder.dim(),
            manifest.tabular_width,
            manifest.text_width
        )));
    }
    if pipeline.feature_names() != manifest.feature_names {
        return Err(AppError::load(
            "Pipeline feature names differ from the manifest; column order cannot be trusted.",
        ));
    }

    let mut bundle = ModelBundle::new(pipeline, model, embedder).map_err(|e| AppError::load(e.to_string()))?;
    bundle.trained_at = manifest.trained_at;

    info!(
        dir = %dir.display(),
        features = bundle.model.n_features(),
        trees = bundle.model.n_trees(),
        "All models loaded"
    );
    Ok(bundle)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    fs::write(path, bytes).map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>, AppError> {
    let path = dir.join(name);
    fs::read(&path).map_err(|e| AppError::load(format!("Failed to read '{}': {e}", path.display())))
}

fn read_verified(dir: &Path, name: &str, manifest: &Manifest) -> Result<Vec<u8>, AppError> {
    let bytes = read_artifact(dir, name)?;
    let expected = manifest
        .checksums
        .get(name)
        .ok_or_else(|| AppError::load(format!("Manifest has no checksum for {name}.")))?;
    let actual = sha256_hex(&bytes);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(AppError::load(format!("Checksum mismatch for {name}.")));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaxFeatures;
    use crate::error::ErrorKind;
    use crate::features::{HashingEmbedder, PipelineOptions};
    use crate::models::{ForestConfig, RandomForest};

    fn record(age: f64, gender: &str, edu: &str, title: &str, years: f64, desc: &str) -> RawRecord {
        RawRecord {
            age: Some(age),
            gender: Some(gender.into()),
            education_level: Some(edu.into()),
            job_title: Some(title.into()),
            years_of_experience: Some(years),
            description: Some(desc.into()),
        }
    }

    fn tiny_bundle() -> ModelBundle {
        let records = vec![
            record(25.0, "Male", "Bachelor's", "Analyst", 2.0, "sql and dashboards"),
            record(32.0, "Female", "Master's", "Engineer", 8.0, "builds backend services"),
            record(45.0, "Male", "PhD", "Director", 20.0, "leads research teams"),
            record(29.0, "Female", "Bachelor's", "Analyst", 4.0, "reporting in excel"),
            record(38.0, "Female", "Master's", "Engineer", 12.0, "distributed systems"),
            record(51.0, "Male", "PhD", "Director", 25.0, "strategy and budgets"),
        ];
        let y = vec![55_000.0, 95_000.0, 180_000.0, 60_000.0, 120_000.0, 200_000.0];

        let pipeline = FeaturePipeline::fit(&records, &PipelineOptions::default()).unwrap();
        let embedder = HashingEmbedder::new(8).unwrap();
        let x = encode_records(&pipeline, &embedder, &records).unwrap();
        let model = RandomForest::fit(
            &x,
            &y,
            &ForestConfig {
                n_estimators: 5,
                max_depth: 4,
                min_samples_split: 2,
                max_features: MaxFeatures::All,
                seed: 42,
            },
        )
        .unwrap();
        ModelBundle::new(pipeline, model, Box::new(embedder)).unwrap()
    }

    #[test]
    fn round_trip_preserves_predictions_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = tiny_bundle();
        let manifest = save_bundle(&bundle, dir.path()).unwrap();
        assert_eq!(manifest.checksums.len(), 3);

        let loaded = load_bundle(dir.path()).unwrap();
        assert_eq!(loaded.pipeline().feature_names(), bundle.pipeline().feature_names());
        assert_eq!(loaded.layout(), bundle.layout());
        assert_eq!(loaded.trained_at(), bundle.trained_at());

        let r = record(30.0, "Male", "Bachelor's", "Analyst", 5.0, "SQL skills");
        assert_eq!(loaded.predict(&r).unwrap(), bundle.predict(&r).unwrap());
    }

    #[test]
    fn prediction_interval_brackets_estimate() {
        let bundle = tiny_bundle();
        let r = record(40.0, "Female", "PhD", "Director", 15.0, "");
        let p = bundle.predict(&r).unwrap();
        assert!(p.interval.0 <= p.point_estimate && p.point_estimate <= p.interval.1);
        assert_eq!(p.interval, heuristic_band(p.point_estimate));
    }

    #[test]
    fn missing_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        fs::remove_file(dir.path().join(MODEL_FILE)).unwrap();
        assert_eq!(load_bundle(dir.path()).unwrap_err().kind(), ErrorKind::LoadError);

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(load_bundle(empty.path()).unwrap_err().kind(), ErrorKind::LoadError);
    }

    #[test]
    fn tampered_artifact_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        fs::write(dir.path().join(EMBEDDER_FILE), "hashing-trigram-v1:8 \n").unwrap();
        let err = load_bundle(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(err.message().contains("Checksum"));
    }

    #[test]
    fn width_disagreement_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();

        // Swap in a different embedder and re-sign it so only the width check can catch it.
        let id = b"hashing-trigram-v1:16\n".to_vec();
        fs::write(dir.path().join(EMBEDDER_FILE), &id).unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILE);
        let mut manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
        manifest.checksums.insert(EMBEDDER_FILE.to_string(), sha256_hex(&id));
        manifest.embedder_id = "hashing-trigram-v1:16".to_string();
        manifest.text_width = 16;
        fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();

        let err = load_bundle(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
    }

    #[test]
    fn unsupported_version_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILE);
        let mut manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
        manifest.format_version = FORMAT_VERSION + 1;
        fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();
        assert!(load_bundle(dir.path()).unwrap_err().message().contains("format version"));
    }

    #[test]
    fn smoke_test_uses_model_width() {
        let bundle = tiny_bundle();
        assert!(bundle.smoke_test().unwrap().is_finite());
        assert_eq!(bundle.model().n_features(), bundle.layout().total_width());
    }

    /// Rewrite the saved model JSON and re-sign it so only structural checks can object.
    fn resign_model(dir: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = dir.join(MODEL_FILE);
        let mut model: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        edit(&mut model);
        let bytes = serde_json::to_vec(&model).unwrap();
        fs::write(&path, &bytes).unwrap();

        let manifest_path = dir.join(MANIFEST_FILE);
        let mut manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
        manifest.checksums.insert(MODEL_FILE.to_string(), sha256_hex(&bytes));
        fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();
    }

    #[test]
    fn reordered_feature_names_are_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        let manifest_path = dir.path().join(MANIFEST_FILE);
        let mut manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
        assert_ne!(manifest.feature_names[3], manifest.feature_names[4]);
        manifest.feature_names.swap(3, 4);
        fs::write(&manifest_path, serde_json::to_vec(&manifest).unwrap()).unwrap();

        let err = load_bundle(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(err.message().contains("feature names"));
    }

    #[test]
    fn forest_without_trees_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        resign_model(dir.path(), |m| m["trees"] = serde_json::json!([]));
        let err = load_bundle(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(err.message().contains("no trees"));
    }

    #[test]
    fn out_of_range_split_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        resign_model(dir.path(), |m| {
            m["trees"][0]["nodes"][0] = serde_json::json!({
                "Split": { "feature": 0, "threshold": 0.0, "left": 999, "right": 1000 }
            });
        });
        assert_eq!(load_bundle(dir.path()).unwrap_err().kind(), ErrorKind::LoadError);

        let dir = tempfile::tempdir().unwrap();
        save_bundle(&tiny_bundle(), dir.path()).unwrap();
        resign_model(dir.path(), |m| {
            let n_features = m["n_features"].as_u64().unwrap();
            m["trees"][0]["nodes"] = serde_json::json!([
                { "Split": { "feature": n_features, "threshold": 0.0, "left": 1, "right": 2 } },
                { "Leaf": { "value": 1.0 } },
                { "Leaf": { "value": 2.0 } }
            ]);
        });
        let err = load_bundle(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadError);
        assert!(err.message().contains("feature"));
    }
}
