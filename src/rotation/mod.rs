//! Rotation event handling.
//!
//! The secret store invokes the rotation function once per step with a
//! [`RotationRequest`]. The handler checks that rotation is enabled, decodes
//! the step and hands it to the [`Rotator`](crate::secrets::Rotator).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::secrets::RotationError;

pub mod handler;

pub use handler::{DistributionHeaderApplier, DistributionHeaderTester, RotationHandler};

/// Rotation event as delivered by the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequest {
    #[serde(rename = "SecretId")]
    pub secret_id: String,
    #[serde(rename = "ClientRequestToken")]
    pub client_request_token: String,
    #[serde(rename = "Step")]
    pub step: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationStep {
    Create,
    Set,
    Test,
    Finish,
}

impl RotationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "createSecret",
            Self::Set => "setSecret",
            Self::Test => "testSecret",
            Self::Finish => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationStep {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createSecret" => Ok(Self::Create),
            "setSecret" => Ok(Self::Set),
            "testSecret" => Ok(Self::Test),
            "finishSecret" => Ok(Self::Finish),
            other => Err(RotationError::invalid_step(other)),
        }
    }
}

/// A decoded rotation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationContext {
    pub secret_id: String,
    pub token: String,
    pub step: RotationStep,
}

impl TryFrom<&RotationRequest> for RotationContext {
    type Error = RotationError;

    fn try_from(request: &RotationRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            secret_id: request.secret_id.clone(),
            token: request.client_request_token.clone(),
            step: request.step.parse()?,
        })
    }
}
