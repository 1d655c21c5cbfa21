use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete build configuration candidate (builder image / toolchain)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecipe {
    /// Catalog name of the builder, e.g. `jdk11`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default)]
    pub image: String,
}

impl BuildRecipe {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }

    /// A recipe without an image cannot be submitted
    pub fn is_submittable(&self) -> bool {
        !self.image.trim().is_empty()
    }
}

impl fmt::Display for BuildRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.image)
        } else {
            write!(f, "{} ({})", self.name, self.image)
        }
    }
}
