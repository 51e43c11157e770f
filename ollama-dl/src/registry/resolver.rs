//! Manifest resolution: model reference → ordered download descriptors.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use super::digest::Digest;
use super::manifest::{LayerKind, Manifest, MANIFEST_MEDIA_TYPE};
use super::reference::ModelReference;
use crate::download::DownloadDescriptor;
use crate::error::{ResolveError, ResolveResult};

/// Default public registry.
pub const DEFAULT_REGISTRY: &str = "https://registry.ollama.ai/";

/// URL of the manifest for `reference` on `registry`.
pub fn manifest_url(registry: &str, reference: &ModelReference) -> String {
    format!(
        "{}/v2/{}/manifests/{}",
        registry.trim_end_matches('/'),
        reference.repository(),
        reference.tag()
    )
}

/// URL of the blob with `digest` in the repository of `reference`.
pub fn blob_url(registry: &str, reference: &ModelReference, digest: &Digest) -> String {
    format!(
        "{}/v2/{}/blobs/{}",
        registry.trim_end_matches('/'),
        reference.repository(),
        digest
    )
}

/// Parse and validate a manifest body fetched from `url`.
pub fn parse_manifest(url: &str, body: &[u8]) -> ResolveResult<Manifest> {
    let manifest: Manifest =
        serde_json::from_slice(body).map_err(|e| ResolveError::ManifestParse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if manifest.media_type != MANIFEST_MEDIA_TYPE {
        return Err(ResolveError::UnsupportedManifest(manifest.media_type));
    }
    Ok(manifest)
}

/// Turn a manifest into descriptors, in manifest order.
///
/// Layers with unknown media types are skipped. A malformed digest on any
/// kept layer fails the whole resolution.
pub fn descriptors_from_manifest(
    manifest: &Manifest,
    registry: &str,
    reference: &ModelReference,
    dest_dir: &Path,
) -> ResolveResult<Vec<DownloadDescriptor>> {
    let mut descriptors = Vec::with_capacity(manifest.layers.len());

    for layer in &manifest.layers {
        let Some(kind) = LayerKind::from_media_type(&layer.media_type) else {
            debug!(media_type = %layer.media_type, digest = %layer.digest, "Skipping unknown layer");
            continue;
        };

        let digest = Digest::parse(&layer.digest)?;
        let destination = dest_dir.join(kind.file_name(digest.short()));
        let source = blob_url(registry, reference, &digest);

        descriptors.push(DownloadDescriptor::new(
            digest,
            source,
            destination,
            layer.size,
            kind,
        ));
    }

    Ok(descriptors)
}

/// Resolves model references against a registry over HTTP.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    client: Client,
    registry: String,
}

impl RegistryResolver {
    /// Create a resolver with its own client.
    pub fn new(registry: impl Into<String>, timeout: Duration) -> ResolveResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ollama-dl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ResolveError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client, registry))
    }

    /// Create a resolver sharing an existing client.
    pub fn with_client(client: Client, registry: impl Into<String>) -> Self {
        Self {
            client,
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Fetch and validate the manifest for `reference`.
    pub async fn fetch_manifest(&self, reference: &ModelReference) -> ResolveResult<Manifest> {
        let url = manifest_url(&self.registry, reference);
        debug!(url = %url, "Fetching manifest");

        let response = self
            .client
            .get(&url)
            .header("Accept", MANIFEST_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| ResolveError::ManifestFetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ResolveError::ManifestStatus { url, status });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::ManifestFetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        parse_manifest(&url, &body)
    }

    /// Resolve `reference` into descriptors targeting `dest_dir`.
    pub async fn resolve(
        &self,
        reference: &ModelReference,
        dest_dir: &Path,
    ) -> ResolveResult<Vec<DownloadDescriptor>> {
        let manifest = self.fetch_manifest(reference).await?;
        let descriptors = descriptors_from_manifest(&manifest, &self.registry, reference, dest_dir)?;

        info!(
            model = %reference,
            layers = manifest.layers.len(),
            jobs = descriptors.len(),
            total_bytes = descriptors.iter().map(|d| d.size).sum::<u64>(),
            "Resolved manifest"
        );
        Ok(descriptors)
    }
}
