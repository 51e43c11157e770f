//! Registry addressing and manifest resolution.
//!
//! This module turns a user-facing model reference into the ordered list of
//! [`DownloadDescriptor`](crate::download::DownloadDescriptor)s that the
//! download engine consumes:
//!
//! ```text
//! "llama3:8b" ──► ModelReference ──► GET /v2/library/llama3/manifests/8b
//!                                          │
//!                                          ▼
//!                                      Manifest ──► [DownloadDescriptor]
//! ```

mod digest;
mod manifest;
mod reference;
mod resolver;

pub use digest::{Digest, SHORT_HASH_LEN};
pub use manifest::{Layer, LayerKind, Manifest, MANIFEST_MEDIA_TYPE};
pub use reference::{ModelReference, DEFAULT_NAMESPACE, DEFAULT_TAG};
pub use resolver::{
    blob_url, descriptors_from_manifest, manifest_url, parse_manifest, RegistryResolver,
    DEFAULT_REGISTRY,
};
