//! Model reference parsing (`[namespace/]name[:tag]`).

use std::fmt;
use std::path::PathBuf;

use crate::error::ResolveError;

/// Namespace used when the reference does not name one.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Tag used when the reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// A normalized model reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    namespace: String,
    name: String,
    tag: String,
}

impl ModelReference {
    /// Parse a reference, filling in the default namespace and tag.
    ///
    /// ```
    /// use ollama_dl::registry::ModelReference;
    ///
    /// let r = ModelReference::parse("llama3").unwrap();
    /// assert_eq!(r.to_string(), "library/llama3:latest");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let input = input.trim();
        let invalid = |reason: &str| ResolveError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let (repository, tag) = match input.split_once(':') {
            Some((repo, tag)) => (repo, tag),
            None => (input, DEFAULT_TAG),
        };
        if tag.is_empty() || tag.contains(['/', ':']) {
            return Err(invalid("tag must be non-empty and contain no '/' or ':'"));
        }

        let (namespace, name) = match repository.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (DEFAULT_NAMESPACE, repository),
        };
        if namespace.is_empty() {
            return Err(invalid("namespace must be non-empty"));
        }
        if name.is_empty() || name.contains('/') {
            return Err(invalid("name must be non-empty and contain no '/'"));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Repository path as used in registry URLs, e.g. `library/llama3`.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Directory name derived from the reference, e.g. `library-llama3-latest`.
    pub fn default_destination(&self) -> PathBuf {
        PathBuf::from(format!("{}-{}-{}", self.namespace, self.name, self.tag))
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.tag)
    }
}
