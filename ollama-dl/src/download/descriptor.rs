//! Download descriptors and job identifiers.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::registry::{Digest, LayerKind};

/// Suffix appended to a destination path to form its staging path.
pub const DEFAULT_STAGING_SUFFIX: &str = ".tmp";

/// Identifier of one job within a run: the descriptor's position in the
/// resolver output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One transferable blob: where it comes from, where it goes, how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    /// Content identifier, used for naming only.
    pub digest: Digest,
    /// Blob URL.
    pub source: String,
    /// Final, user-visible location.
    pub destination: PathBuf,
    /// Expected total size in bytes.
    pub size: u64,
    /// Layer classification.
    pub kind: LayerKind,
}

impl DownloadDescriptor {
    pub fn new(
        digest: Digest,
        source: impl Into<String>,
        destination: impl Into<PathBuf>,
        size: u64,
        kind: LayerKind,
    ) -> Self {
        Self {
            digest,
            source: source.into(),
            destination: destination.into(),
            size,
            kind,
        }
    }

    /// Staging path for this descriptor: the destination with `suffix` appended.
    pub fn staging_path(&self, suffix: &str) -> PathBuf {
        staging_path_for(&self.destination, suffix)
    }
}

/// Append `suffix` to the final component of `destination`.
pub fn staging_path_for(destination: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = destination.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}
