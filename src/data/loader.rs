// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Loads labelled images from the conventional folder layout:
//
//   <root>/<split>/<class name>/<image file>
//
// The class index of a folder is its position among the
// sorted class folder names of the TRAIN split, so train and
// val always agree on which index means which class.
//
// Each image is decoded with the `image` crate, resized to
// image_size × image_size, converted to RGB, scaled from
// 0..=255 to 0.0..=1.0 and flattened channel-major:
//
//   [R(0,0) R(0,1) ... R(S-1,S-1) G(0,0) ... B(S-1,S-1)]
//
// Files that cannot be decoded are skipped with a warning.
//
// Reference: image crate documentation

use anyhow::{bail, Context, Result};
use image::imageops::FilterType;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::dataset::ImageSample;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

pub struct ImageFolderLoader {
    root:       PathBuf,
    image_size: usize,
}

impl ImageFolderLoader {
    pub fn new(root: impl Into<PathBuf>, image_size: usize) -> Self {
        Self { root: root.into(), image_size }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if `<root>/<split>` exists as a directory.
    pub fn has_split(&self, split: &str) -> bool {
        self.root.join(split).is_dir()
    }

    /// Sorted names of the class folders inside `<root>/<split>`.
    pub fn class_names(&self, split: &str) -> Result<Vec<String>> {
        let dir = self.root.join(split);
        let mut names = Vec::new();

        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        if names.is_empty() {
            bail!("No class folders found in '{}'", dir.display());
        }
        names.sort();
        Ok(names)
    }

    /// Load every image under `<root>/<split>/<class>` for the given classes.
    /// A class folder missing from this split is treated as empty.
    pub fn load_split(&self, split: &str, classes: &[String]) -> Result<Vec<ImageSample>> {
        let mut samples = Vec::new();

        for (label, class) in classes.iter().enumerate() {
            let dir = self.root.join(split).join(class);
            if !dir.is_dir() {
                tracing::warn!("Class folder '{}' is missing", dir.display());
                continue;
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&dir)
                .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_image_file(p))
                .collect();
            files.sort();

            for path in files {
                match self.load_image(&path) {
                    Ok(pixels) => samples.push(ImageSample::new(pixels, label)),
                    Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
                }
            }
        }

        tracing::info!(
            "Loaded {} images from '{}'",
            samples.len(),
            self.root.join(split).display()
        );
        Ok(samples)
    }

    fn load_image(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode '{}'", path.display()))?;

        let size = self.image_size as u32;
        let rgb  = img.resize_exact(size, size, FilterType::Triangle).to_rgb8();

        let plane = self.image_size * self.image_size;
        let mut pixels = vec![0.0f32; 3 * plane];
        for (x, y, px) in rgb.enumerate_pixels() {
            let offset = y as usize * self.image_size + x as usize;
            for c in 0..3 {
                pixels[c * plane + offset] = px[c] as f32 / 255.0;
            }
        }
        Ok(pixels)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
