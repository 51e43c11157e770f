//! Registry manifest schema and layer classification.

use std::fmt;

use serde::Deserialize;

/// The only manifest media type the resolver accepts.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// A v2 image manifest as served by the registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

/// One blob listed in a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
}

/// Classification of a layer, which picks its destination filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    License,
    Model,
    Params,
    System,
    Template,
}

impl LayerKind {
    /// Map a layer media type to its kind. Unknown media types yield `None`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "application/vnd.ollama.image.license" => Some(Self::License),
            "application/vnd.ollama.image.model" => Some(Self::Model),
            "application/vnd.ollama.image.params" => Some(Self::Params),
            "application/vnd.ollama.image.system" => Some(Self::System),
            "application/vnd.ollama.image.template" => Some(Self::Template),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Model => "model",
            Self::Params => "params",
            Self::System => "system",
            Self::Template => "template",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Model => "gguf",
            Self::Params => "json",
            Self::License | Self::System | Self::Template => "txt",
        }
    }

    /// Destination filename for a blob of this kind: `{kind}-{short}.{ext}`.
    pub fn file_name(&self, short_hash: &str) -> String {
        format!("{}-{}.{}", self.as_str(), short_hash, self.extension())
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
