//! Value types shared by the secret store, the cache and the rotator.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// Secret versions and generated values travel through the cache, the
/// rotator and the distribution updater as `SecretString`, so none of them
/// can end up in a log line by accident. Memory is zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying secret value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares against a presented value without short-circuiting on the
    /// first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let (a, b) = (self.0.as_bytes(), candidate.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new("")
    }
}

/// Stage label attached to a secret version.
///
/// A rotating secret has at most one version per stage at any time; the
/// three stages together are the versions an authorizer may tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VersionStage {
    #[serde(rename = "AWSCURRENT")]
    Current,
    #[serde(rename = "AWSPREVIOUS")]
    Previous,
    #[serde(rename = "AWSPENDING")]
    Pending,
}

impl VersionStage {
    /// Vendor label used on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Previous => "AWSPREVIOUS",
            Self::Pending => "AWSPENDING",
        }
    }
}

impl fmt::Display for VersionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VersionStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AWSCURRENT" => Ok(Self::Current),
            "AWSPREVIOUS" => Ok(Self::Previous),
            "AWSPENDING" => Ok(Self::Pending),
            other => Err(format!("unknown version stage: {other}")),
        }
    }
}

/// A secret version as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretValue {
    pub value: SecretString,
    pub version_id: Option<String>,
    /// When the store created this version, if it reports it.
    pub created_at: Option<DateTime<Utc>>,
}

impl SecretValue {
    pub fn new(value: impl Into<SecretString>) -> Self {
        Self { value: value.into(), version_id: None, created_at: None }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Rotation metadata for a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretDescription {
    pub rotation_enabled: bool,
    /// Version token to the stage labels it currently carries.
    pub version_to_stages: HashMap<String, Vec<VersionStage>>,
}

impl SecretDescription {
    /// Version token currently labelled with `stage`, if any.
    pub fn version_with_stage(&self, stage: VersionStage) -> Option<&str> {
        self.version_to_stages
            .iter()
            .find(|(_, stages)| stages.contains(&stage))
            .map(|(version, _)| version.as_str())
    }
}

/// Parameters for generating a fresh secret value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomValueSpec {
    pub length: usize,
    pub exclude_punctuation: bool,
    pub include_space: bool,
    /// Require at least one character from every included character class.
    pub require_each_class: bool,
}

impl Default for RandomValueSpec {
    fn default() -> Self {
        Self { length: 64, exclude_punctuation: false, include_space: false, require_each_class: true }
    }
}
