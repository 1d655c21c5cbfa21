//! Builder image catalog proposing build recipes
//!
//! The catalog is shared between the configuration reloader and every
//! reconciler, so it only hands out snapshots and never exposes its list.
//!
//! Builder images are described by a flat system configuration:
//!
//! ```text
//! builder-image.names = jdk11,jdk8,jdk17
//! builder-image.jdk11.image = quay.io/example/jdk11-builder:latest
//! ```

use crate::model::BuildRecipe;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Key listing the configured builder names
pub const SYSTEM_BUILDER_IMAGES: &str = "builder-image.names";

/// Recipes proposed when no builder images are configured, in attempt order
pub const DEFAULT_BUILDER_IMAGES: &[(&str, &str)] = &[
    ("jdk11", "quay.io/sdouglas/hacbs-jdk11-builder:latest"),
    ("jdk8", "quay.io/sdouglas/hacbs-jdk8-builder:latest"),
    ("jdk17", "quay.io/sdouglas/hacbs-jdk17-builder:latest"),
];

/// Key holding the image reference of builder `name`
pub fn builder_image_key(name: &str) -> String {
    format!("builder-image.{}.image", name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderImage {
    pub name: String,
    pub image: String,
}

impl BuilderImage {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Parse builder images from a system configuration map
///
/// Builders without an image are skipped; they would never be usable.
pub fn parse_system_config(config: &HashMap<String, String>) -> Vec<BuilderImage> {
    let Some(names) = config.get(SYSTEM_BUILDER_IMAGES) else {
        return Vec::new();
    };

    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| match config.get(&builder_image_key(name)) {
            Some(image) if !image.trim().is_empty() => {
                Some(BuilderImage::new(name, image.trim()))
            }
            _ => {
                warn!(
                    builder = name,
                    "Missing system config for builder image, image will not be usable"
                );
                None
            }
        })
        .collect()
}

/// Synchronized catalog of builder images
#[derive(Debug, Default)]
pub struct RecipeCatalog {
    images: RwLock<Vec<BuilderImage>>,
}

impl RecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_images(images: Vec<BuilderImage>) -> Self {
        Self {
            images: RwLock::new(images),
        }
    }

    /// A writer that panicked leaves the list itself intact, so poisoning is logged and cleared
    fn read(&self) -> RwLockReadGuard<'_, Vec<BuilderImage>> {
        self.images.read().unwrap_or_else(|poisoned| {
            warn!("Builder image catalog lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<BuilderImage>> {
        self.images.write().unwrap_or_else(|poisoned| {
            warn!("Builder image catalog lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn append(&self, image: BuilderImage) {
        self.write().push(image);
    }

    pub fn snapshot(&self) -> Vec<BuilderImage> {
        self.read().to_vec()
    }

    /// Replace the catalog with the builders described by `config`
    ///
    /// Returns the number of usable builders loaded.
    pub fn load_system_config(&self, config: &HashMap<String, String>) -> usize {
        let parsed = parse_system_config(config);
        let count = parsed.len();
        *self.write() = parsed;
        debug!(builders = count, "Loaded builder images from system config");
        count
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered recipes to try for a newly seen dependency build
    ///
    /// There is no source inspection yet, so every configured builder is
    /// proposed in catalog order; an empty catalog proposes the defaults.
    pub fn propose(&self) -> Vec<BuildRecipe> {
        let images = self.snapshot();
        if images.is_empty() {
            return DEFAULT_BUILDER_IMAGES
                .iter()
                .map(|(name, image)| BuildRecipe::new(*name, *image))
                .collect();
        }
        images
            .into_iter()
            .map(|b| BuildRecipe::new(b.name, b.image))
            .collect()
    }
}
