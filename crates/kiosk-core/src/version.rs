//! Asset version tokens
//!
//! A version token is opaque: manifests carry either a build number or a
//! content hash. Tokens are compared through a [`VersionPolicy`].

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identity token of an installed or remote asset
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AssetVersion(String);

impl AssetVersion {
    /// Create a token; surrounding whitespace is ignored. Empty tokens are rejected.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(AssetVersion(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token as an unsigned ordinal, if it is one
    pub fn as_ordinal(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for AssetVersion {
    fn from(n: u64) -> Self {
        AssetVersion(n.to_string())
    }
}

impl fmt::Debug for AssetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for AssetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for AssetVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawVersion::deserialize(deserializer)? {
            RawVersion::Number(n) => Ok(AssetVersion::from(n)),
            RawVersion::Text(s) => AssetVersion::parse(&s).ok_or_else(|| D::Error::custom("empty version token")),
        }
    }
}

impl Serialize for AssetVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// How a remote token is judged against the installed one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Strictly greater: numeric when both tokens are ordinals, lexical otherwise
    Ordinal,
    /// Any difference triggers an update (content hashes)
    Different,
    /// Numeric "greater" when both tokens are ordinals, "different" otherwise
    #[default]
    Auto,
}

impl VersionPolicy {
    /// Should `remote` replace `current`? Equal tokens never do.
    pub fn should_update(self, remote: &AssetVersion, current: &AssetVersion) -> bool {
        if remote == current {
            return false;
        }
        let ordinals = remote.as_ordinal().zip(current.as_ordinal());
        match (self, ordinals) {
            (VersionPolicy::Different, _) => true,
            (_, Some((r, c))) => r > c,
            (VersionPolicy::Ordinal, None) => remote.as_str() > current.as_str(),
            (VersionPolicy::Auto, None) => true,
        }
    }
}
