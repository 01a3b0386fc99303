//! Downstream distribution configuration.
//!
//! A distribution fronts the function URL and forwards the API key to it as
//! an origin custom header. During rotation the pending secret is written
//! into that header, so the header and the secret move together.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

#[cfg(feature = "aws")]
pub mod cloudfront;

pub use memory::InMemoryDistributions;

#[cfg(feature = "aws")]
pub use cloudfront::CloudFrontUpdater;

pub type Result<T> = std::result::Result<T, DistributionError>;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("no configuration mutators supplied")]
    NoMutators,

    #[error("Distribution not found: {id}")]
    NotFound { id: String },

    /// The distribution changed between read and write.
    #[error("Distribution {id} was modified concurrently")]
    PreconditionFailed { id: String },

    #[error("Distribution backend error: {message}")]
    Backend { message: String },
}

impl DistributionError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn precondition_failed(id: impl Into<String>) -> Self {
        Self::PreconditionFailed { id: id.into() }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

impl CustomHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub id: String,
    pub domain_name: String,
    pub custom_headers: Vec<CustomHeader>,
}

/// The part of a distribution's configuration rotation cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub origins: Vec<Origin>,
}

impl DistributionConfig {
    /// Values of every origin header named `name`, compared case-insensitively.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.origins
            .iter()
            .flat_map(|origin| origin.custom_headers.iter())
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

/// One in-place edit of a distribution configuration.
pub type ConfigMutator = Box<dyn Fn(&mut DistributionConfig) + Send + Sync>;

/// Mutator that sets `name` to `value` on every origin that already carries
/// the header. Origins without it are left alone.
pub fn update_custom_header(name: impl Into<String>, value: impl Into<String>) -> ConfigMutator {
    let (name, value) = (name.into(), value.into());
    Box::new(move |config: &mut DistributionConfig| {
        for origin in &mut config.origins {
            if let Some(header) = origin.custom_headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
                header.value = value.clone();
            }
        }
    })
}

#[async_trait]
pub trait DistributionUpdater: Send + Sync {
    async fn fetch(&self, distribution_id: &str) -> Result<DistributionConfig>;

    /// Read the configuration, apply `mutators` in order and write it back.
    async fn update(&self, distribution_id: &str, mutators: Vec<ConfigMutator>) -> Result<()>;
}
