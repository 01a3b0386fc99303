//! In-memory versioned secret store.
//!
//! Intended for **development and testing only**. Nothing is persisted and
//! every process starts empty.
//!
//! Stage labels follow the same rules as a managed secret store:
//! - each stage sits on at most one version of a secret
//! - moving the current stage onto a version hands the previous stage to
//!   the version that held current, and drops pending from the new holder
//! - writing an existing version id again is accepted only with the same value
//!
//! # Example
//!
//! ```rust,ignore
//! use secure_lambda_url::secrets::{InMemorySecretStore, SecretStore, VersionStage};
//!
//! let store = InMemorySecretStore::new().with_secret("api-key", "initial-value");
//! let current = store.get_secret_value("api-key", VersionStage::Current, None).await?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::RwLock;

use super::error::{Result, StoreError};
use super::store::SecretStore;
use super::types::{RandomValueSpec, SecretDescription, SecretString, SecretValue, VersionStage};
use crate::utils::generate_id;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const PUNCTUATION: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";
const SPACE: &[u8] = b" ";

#[derive(Debug, Clone)]
struct StoredVersion {
    value: SecretString,
    created_at: DateTime<Utc>,
    stages: BTreeSet<VersionStage>,
}

#[derive(Debug, Clone)]
struct StoredSecret {
    rotation_enabled: bool,
    versions: HashMap<String, StoredVersion>,
}

impl Default for StoredSecret {
    fn default() -> Self {
        Self { rotation_enabled: true, versions: HashMap::new() }
    }
}

impl StoredSecret {
    fn holder_of(&self, stage: VersionStage) -> Option<String> {
        self.versions.iter().find(|(_, v)| v.stages.contains(&stage)).map(|(id, _)| id.clone())
    }

    /// Put `stage` on `version`, keeping labels unique.
    fn move_stage(&mut self, stage: VersionStage, version: &str) {
        let old_holder = self.holder_of(stage);
        if old_holder.as_deref() == Some(version) {
            return;
        }

        for stored in self.versions.values_mut() {
            stored.stages.remove(&stage);
        }

        if stage == VersionStage::Current {
            if let Some(old) = old_holder {
                self.move_stage(VersionStage::Previous, &old);
            }
        }

        if let Some(stored) = self.versions.get_mut(version) {
            stored.stages.insert(stage);
            if stage == VersionStage::Current {
                stored.stages.remove(&VersionStage::Pending);
                stored.stages.remove(&VersionStage::Previous);
            }
        }
    }

    /// Drop versions left without any label, except `keep`.
    fn prune(&mut self, keep: &str) {
        self.versions.retain(|id, v| id == keep || !v.stages.is_empty());
    }
}

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub put: usize,
    pub describe: usize,
    pub update: usize,
    pub generate: usize,
}

#[derive(Default)]
struct Counters {
    get: AtomicUsize,
    put: AtomicUsize,
    describe: AtomicUsize,
    update: AtomicUsize,
    generate: AtomicUsize,
}

/// In-memory [`SecretStore`] (development and tests only).
#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, StoredSecret>>,
    counters: Counters,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret whose only version holds the current stage.
    pub fn with_secret(mut self, secret_id: impl Into<String>, value: impl Into<SecretString>) -> Self {
        let version = StoredVersion {
            value: value.into(),
            created_at: Utc::now(),
            stages: BTreeSet::from([VersionStage::Current]),
        };
        self.secrets
            .get_mut()
            .entry(secret_id.into())
            .or_default()
            .versions
            .insert(generate_id(), version);
        self
    }

    pub fn with_rotation_disabled(mut self, secret_id: impl Into<String>) -> Self {
        self.secrets.get_mut().entry(secret_id.into()).or_default().rotation_enabled = false;
        self
    }

    /// Insert a version with explicit stages and creation time.
    pub async fn insert_version(
        &self,
        secret_id: &str,
        version_id: &str,
        value: impl Into<SecretString>,
        stages: &[VersionStage],
        created_at: DateTime<Utc>,
    ) {
        let mut secrets = self.secrets.write().await;
        let secret = secrets.entry(secret_id.to_string()).or_default();
        for stored in secret.versions.values_mut() {
            for stage in stages {
                stored.stages.remove(stage);
            }
        }
        secret.versions.insert(
            version_id.to_string(),
            StoredVersion { value: value.into(), created_at, stages: stages.iter().copied().collect() },
        );
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            get: c.get.load(Ordering::SeqCst),
            put: c.put.load(Ordering::SeqCst),
            describe: c.describe.load(Ordering::SeqCst),
            update: c.update.load(Ordering::SeqCst),
            generate: c.generate.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        let secrets = self.secrets.read().await;
        let secret = secrets.get(secret_id).ok_or_else(|| StoreError::not_found(secret_id))?;

        secret
            .versions
            .iter()
            .filter(|(id, _)| version_id.map_or(true, |wanted| wanted == id.as_str()))
            .find(|(_, v)| v.stages.contains(&stage))
            .map(|(id, v)| SecretValue {
                value: v.value.clone(),
                version_id: Some(id.clone()),
                created_at: Some(v.created_at),
            })
            .ok_or_else(|| StoreError::not_found(secret_id))
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        version_id: Option<&str>,
        stages: &[VersionStage],
        value: &SecretString,
    ) -> Result<()> {
        self.counters.put.fetch_add(1, Ordering::SeqCst);
        let mut secrets = self.secrets.write().await;
        let secret = secrets.get_mut(secret_id).ok_or_else(|| StoreError::not_found(secret_id))?;
        let version_id = version_id.map(str::to_string).unwrap_or_else(generate_id);

        match secret.versions.get(&version_id) {
            Some(existing) if existing.value != *value => {
                return Err(StoreError::invalid_request(
                    secret_id,
                    format!("version {version_id} already exists with a different value"),
                ));
            }
            Some(_) => {}
            None => {
                secret.versions.insert(
                    version_id.clone(),
                    StoredVersion { value: value.clone(), created_at: Utc::now(), stages: BTreeSet::new() },
                );
            }
        }

        for stage in stages {
            secret.move_stage(*stage, &version_id);
        }
        secret.prune(&version_id);

        tracing::debug!(secret_id = %secret_id, version_id = %version_id, "Stored secret version");
        Ok(())
    }

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretDescription> {
        self.counters.describe.fetch_add(1, Ordering::SeqCst);
        let secrets = self.secrets.read().await;
        let secret = secrets.get(secret_id).ok_or_else(|| StoreError::not_found(secret_id))?;

        Ok(SecretDescription {
            rotation_enabled: secret.rotation_enabled,
            version_to_stages: secret
                .versions
                .iter()
                .map(|(id, v)| (id.clone(), v.stages.iter().copied().collect()))
                .collect(),
        })
    }

    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<()> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        let mut secrets = self.secrets.write().await;
        let secret = secrets.get_mut(secret_id).ok_or_else(|| StoreError::not_found(secret_id))?;

        if !secret.versions.contains_key(move_to) {
            return Err(StoreError::not_found(format!("{secret_id} version {move_to}")));
        }

        let holder = secret.holder_of(stage);
        if holder.is_some() && holder.as_deref() != Some(move_to) && holder.as_deref() != remove_from {
            return Err(StoreError::invalid_request(
                secret_id,
                format!("{stage} is attached to another version than the one to remove it from"),
            ));
        }

        secret.move_stage(stage, move_to);
        secret.prune(move_to);
        tracing::debug!(secret_id = %secret_id, stage = %stage, version_id = %move_to, "Moved version stage");
        Ok(())
    }

    async fn generate_random_value(&self, spec: &RandomValueSpec) -> Result<SecretString> {
        self.counters.generate.fetch_add(1, Ordering::SeqCst);
        generate(spec)
    }
}

fn generate(spec: &RandomValueSpec) -> Result<SecretString> {
    let mut classes: Vec<&[u8]> = vec![LOWERCASE, UPPERCASE, DIGITS];
    if !spec.exclude_punctuation {
        classes.push(PUNCTUATION);
    }
    if spec.include_space {
        classes.push(SPACE);
    }

    if spec.length == 0 || (spec.require_each_class && spec.length < classes.len()) {
        return Err(StoreError::invalid_request(
            "random value",
            format!("length {} cannot hold every required character class", spec.length),
        ));
    }

    let alphabet: Vec<u8> = classes.concat();
    let mut rng = rand::thread_rng();
    let mut out: Vec<u8> = Vec::with_capacity(spec.length);

    if spec.require_each_class {
        for class in &classes {
            out.push(class[rng.gen_range(0..class.len())]);
        }
    }
    while out.len() < spec.length {
        if let Some(c) = alphabet.choose(&mut rng) {
            out.push(*c);
        }
    }
    out.shuffle(&mut rng);

    String::from_utf8(out).map(SecretString::new).map_err(|e| StoreError::backend(e.to_string()))
}
