//! Content digests in `algorithm:hex` form.

use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;

/// The only digest algorithm the registry serves.
pub const SHA256: &str = "sha256";

/// Number of hex characters used in destination filenames.
pub const SHORT_HASH_LEN: usize = 12;

/// A validated content digest such as `sha256:4f2a...`.
///
/// Digests are used for addressing and file naming only; downloaded bytes are
/// never hashed against them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parse a digest string, rejecting anything that is not `sha256:<hex>`
    /// with at least [`SHORT_HASH_LEN`] lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidDigest(s.to_string());

        let (algorithm, hex) = s.split_once(':').ok_or_else(invalid)?;
        if algorithm != SHA256 {
            return Err(invalid());
        }
        if hex.len() < SHORT_HASH_LEN
            || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(invalid());
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// The algorithm prefix, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The full hex portion.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// The first twelve hex characters, used in destination filenames.
    pub fn short(&self) -> &str {
        &self.hex[..SHORT_HASH_LEN]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FULL: &str = "sha256:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1234";

    #[test]
    fn test_parse_valid_digest() {
        let digest = Digest::parse(FULL).unwrap();
        assert_eq!(digest.algorithm(), "sha256");
        assert_eq!(digest.short(), "aaaaaaaaaaaa");
        assert_eq!(digest.to_string(), FULL);
    }

    #[test]
    fn test_parse_rejects_other_algorithms() {
        assert!(matches!(
            Digest::parse("md5:aaaaaaaaaaaaaaaa"),
            Err(ResolveError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert!(Digest::parse("sha256aaaaaaaaaaaaaaaa").is_err());
    }

    #[test]
    fn test_parse_rejects_short_or_non_hex() {
        assert!(Digest::parse("sha256:abc").is_err());
        assert!(Digest::parse("sha256:zzzzzzzzzzzzzzzz").is_err());
        assert!(Digest::parse("sha256:AAAAAAAAAAAAAAAA").is_err());
    }

    proptest! {
        #[test]
        fn prop_valid_hex_round_trips(hex in "[0-9a-f]{12,64}") {
            let s = format!("sha256:{}", hex);
            let digest = Digest::parse(&s).unwrap();
            prop_assert_eq!(digest.to_string(), s);
            prop_assert_eq!(digest.short(), &hex[..12]);
        }
    }
}
