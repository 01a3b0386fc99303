//! Scripted store double for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::{Result, StoreError};
use super::store::SecretStore;
use super::types::{RandomValueSpec, SecretDescription, SecretString, SecretValue, VersionStage};

#[derive(Clone)]
pub(crate) enum Reply {
    Value(SecretValue),
    NotFound,
    Fail(&'static str),
}

impl Reply {
    pub(crate) fn value(value: &str) -> Self {
        Reply::Value(SecretValue::new(value))
    }
}

/// Store whose answers are scripted per stage. Unscripted stages are NotFound.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    replies: Mutex<HashMap<VersionStage, Reply>>,
    description: Mutex<Option<SecretDescription>>,
    gets: Mutex<Vec<(VersionStage, Option<String>)>>,
    pub(crate) puts: Mutex<Vec<(Option<String>, Vec<VersionStage>, String)>>,
    pub(crate) updates: Mutex<Vec<(VersionStage, String, Option<String>)>>,
    describes: AtomicUsize,
    generates: AtomicUsize,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, stage: VersionStage, reply: Reply) -> Self {
        self.set_reply(stage, reply);
        self
    }

    pub(crate) fn set_reply(&self, stage: VersionStage, reply: Reply) {
        self.replies.lock().unwrap().insert(stage, reply);
    }

    pub(crate) fn describe(self, description: SecretDescription) -> Self {
        *self.description.lock().unwrap() = Some(description);
        self
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.gets.lock().unwrap().len()
    }

    pub(crate) fn get_calls_for(&self, stage: VersionStage) -> usize {
        self.gets.lock().unwrap().iter().filter(|(s, _)| *s == stage).count()
    }

    pub(crate) fn requested_versions(&self) -> Vec<(VersionStage, Option<String>)> {
        self.gets.lock().unwrap().clone()
    }

    pub(crate) fn put_calls(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub(crate) fn describe_calls(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    pub(crate) fn generate_calls(&self) -> usize {
        self.generates.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.get_calls()
            + self.put_calls()
            + self.update_calls()
            + self.describe_calls()
            + self.generate_calls()
    }
}

#[async_trait]
impl SecretStore for ScriptedStore {
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<SecretValue> {
        self.gets.lock().unwrap().push((stage, version_id.map(str::to_string)));
        let reply = self.replies.lock().unwrap().get(&stage).cloned().unwrap_or(Reply::NotFound);
        match reply {
            Reply::Value(value) => Ok(value),
            Reply::NotFound => Err(StoreError::not_found(secret_id)),
            Reply::Fail(message) => Err(StoreError::connection_failed(message)),
        }
    }

    async fn put_secret_value(
        &self,
        _secret_id: &str,
        version_id: Option<&str>,
        stages: &[VersionStage],
        value: &SecretString,
    ) -> Result<()> {
        self.puts.lock().unwrap().push((
            version_id.map(str::to_string),
            stages.to_vec(),
            value.expose_secret().to_string(),
        ));
        Ok(())
    }

    async fn describe_secret(&self, secret_id: &str) -> Result<SecretDescription> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        self.description.lock().unwrap().clone().ok_or_else(|| StoreError::not_found(secret_id))
    }

    async fn update_secret_version_stage(
        &self,
        _secret_id: &str,
        stage: VersionStage,
        move_to: &str,
        remove_from: Option<&str>,
    ) -> Result<()> {
        self.updates.lock().unwrap().push((stage, move_to.to_string(), remove_from.map(str::to_string)));
        Ok(())
    }

    async fn generate_random_value(&self, spec: &RandomValueSpec) -> Result<SecretString> {
        self.generates.fetch_add(1, Ordering::SeqCst);
        Ok(SecretString::new("g".repeat(spec.length)))
    }
}
