// ============================================================
// Layer 6 — Checkpoint Storage
// ============================================================
// Persists model weights and the run configuration.
//
// Weights are written with Burn's NamedMpkFileRecorder at full
// precision: MessagePack, field names kept, no compression. The
// recorder always writes with the `.mpk` extension, replacing
// any extension the given path carries.
//
// File layout (default):
//   <weights-dir>/
//     TeacherNet.mpk     ← best weights of a teacher run
//     TeacherNet.json    ← the run configuration
//     StudentNet.mpk
//     StudentNet.json
//     metrics.csv
//
// The file name is the model's Rust type name with the module
// path and generic parameters stripped, so TeacherNet<Autodiff<…>>
// and TeacherNet<NdArray> share one file.

use anyhow::{anyhow, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use crate::domain::traits::WeightSink;

pub const WEIGHTS_EXTENSION: &str = "mpk";

type WeightRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// `crate::ml::model::TeacherNet<Autodiff<NdArray>>` → `TeacherNet`
pub fn model_type_name<M>() -> &'static str {
    let full = std::any::type_name::<M>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics.rsplit("::").next().unwrap_or(without_generics)
}

/// `<dir>/<TypeName>.mpk`
pub fn default_weights_path<M>(dir: &Path) -> PathBuf {
    dir.join(format!("{}.{WEIGHTS_EXTENSION}", model_type_name::<M>()))
}

// ─── Weight File ──────────────────────────────────────────────────────────────

/// A single weights file that every improvement overwrites.
///
/// `B` pins the backend the stored modules live on, which lets
/// one file type serve as a `WeightSink` for any module on `B`.
#[derive(Debug, Clone)]
pub struct WeightFile<B: Backend> {
    path:     PathBuf,
    writes:   usize,
    _backend: PhantomData<B>,
}

impl<B: Backend> WeightFile<B> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into().with_extension(WEIGHTS_EXTENSION);
        Self { path, writes: 0, _backend: PhantomData }
    }

    /// Use `path` if given, otherwise the default file for `M` in `dir`.
    pub fn resolve<M>(path: Option<PathBuf>, dir: &Path) -> Self {
        Self::new(path.unwrap_or_else(|| default_weights_path::<M>(dir)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times weights were written through this handle.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Overwrite the file with `model`'s parameters.
    pub fn save<M: Module<B>>(&mut self, model: &M) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        WeightRecorder::new()
            .record(model.clone().into_record(), self.path.clone())
            .map_err(|e| anyhow!("Failed to save weights to '{}': {:?}", self.path.display(), e))?;

        self.writes += 1;
        tracing::debug!("Saved weights to '{}' (write #{})", self.path.display(), self.writes);
        Ok(())
    }

    /// Load stored parameters into `model`, which must have the same architecture.
    pub fn load<M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let record = WeightRecorder::new()
            .load(self.path.clone(), device)
            .map_err(|e| {
                anyhow!(
                    "Cannot load weights '{}'. Have you run 'train' first? ({:?})",
                    self.path.display(), e
                )
            })?;
        Ok(model.load_record(record))
    }
}

impl<B: Backend, M: Module<B>> WeightSink<M> for WeightFile<B> {
    fn persist(&mut self, model: &M) -> Result<()> {
        self.save(model)
    }
}

// ─── Run Configuration ────────────────────────────────────────────────────────

/// Path of the JSON config that sits next to a weights file.
pub fn config_path_for(weights_path: &Path) -> PathBuf {
    weights_path.with_extension("json")
}

/// Write the run configuration so a later `evaluate` can rebuild the model.
pub fn save_config<T: Serialize>(path: &Path, cfg: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
    tracing::debug!("Saved run config to '{}'", path.display());
    Ok(())
}

pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).with_context(|| {
        format!(
            "Cannot read config from '{}'. Make sure you have run 'train' before 'evaluate'.",
            path.display()
        )
    })?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed config '{}'", path.display()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{Classifier, StudentNet, StudentNetConfig, TeacherNet};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_type_name_strips_path_and_generics() {
        assert_eq!(model_type_name::<TeacherNet<TestBackend>>(), "TeacherNet");
        assert_eq!(model_type_name::<StudentNet<NdArray>>(), "StudentNet");
        assert_eq!(model_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_default_path() {
        let path = default_weights_path::<StudentNet<TestBackend>>(Path::new("Weights"));
        assert_eq!(path, PathBuf::from("Weights/StudentNet.mpk"));
        assert_eq!(config_path_for(&path), PathBuf::from("Weights/StudentNet.json"));
    }

    #[test]
    fn test_extension_is_normalised() {
        let file = WeightFile::<NdArray>::new("out/model.pth");
        assert_eq!(file.path(), Path::new("out/model.mpk"));
    }

    #[test]
    fn test_save_then_load_into_inner_backend() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();

        let trained = StudentNetConfig::new(2).with_width(4).init::<TestBackend>(&device);
        let mut file = WeightFile::<TestBackend>::resolve::<StudentNet<TestBackend>>(None, dir.path());
        file.persist(&trained).unwrap();
        assert!(file.path().exists());
        assert_eq!(file.writes(), 1);

        // Weights written from the autodiff backend load into the plain one.
        let reader = WeightFile::<NdArray>::new(file.path());
        let fresh = StudentNetConfig::new(2).with_width(4).init::<NdArray>(&device);
        let loaded = reader.load(fresh, &device).unwrap();

        let expected = trained.head.weight.val().into_data().to_vec::<f32>().unwrap();
        let actual = loaded.head.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(actual, expected);
        assert_eq!(loaded.num_classes(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = WeightFile::<NdArray>::new(dir.path().join("absent.mpk"));
        let model = StudentNetConfig::new(2).init::<NdArray>(&Default::default());
        assert!(file.load(model, &Default::default()).is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cfg.json");
        save_config(&path, &vec![1_u32, 2, 3]).unwrap();
        let back: Vec<u32> = load_config(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
