//! Workflow records as listed by the registry and as persisted locally

use crate::ids::{DonId, Owner, SecretsId, WorkflowId, WorkflowKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow status code: {0}")]
pub struct StatusError(pub u8);

/// Workflow status.
///
/// Serialized with the registry's numeric encoding: `0` active, `1` paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WorkflowStatus {
    Active,
    Paused,
}

impl WorkflowStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, WorkflowStatus::Active)
    }
}

impl TryFrom<u8> for WorkflowStatus {
    type Error = StatusError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(WorkflowStatus::Active),
            1 => Ok(WorkflowStatus::Paused),
            other => Err(StatusError(other)),
        }
    }
}

impl From<WorkflowStatus> for u8 {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Active => 0,
            WorkflowStatus::Paused => 1,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Active => write!(f, "active"),
            WorkflowStatus::Paused => write!(f, "paused"),
        }
    }
}

/// A workflow as currently registered on-chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub owner: Owner,
    pub name: String,
    pub don_id: DonId,
    pub status: WorkflowStatus,
    pub binary_url: String,
    pub config_url: String,
    pub secrets_url: String,
}

impl WorkflowRecord {
    pub fn key(&self) -> WorkflowKey {
        WorkflowKey::derive(&self.owner, &self.name)
    }
}

/// Locally persisted view of a workflow.
///
/// Exactly one spec exists per `(owner, name)`; it always reflects the most
/// recently applied registry event for that pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub name: String,
    pub don_id: DonId,
    pub status: WorkflowStatus,
    pub binary_url: String,
    pub config_url: String,
    pub secrets_url: String,

    /// Cached secrets row for `secrets_url`, once fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_id: Option<SecretsId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowSpec {
    pub fn from_record(record: &WorkflowRecord, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id: record.id,
            owner: record.owner,
            name: record.name.clone(),
            don_id: record.don_id,
            status: record.status,
            binary_url: record.binary_url.clone(),
            config_url: record.config_url.clone(),
            secrets_url: record.secrets_url.clone(),
            secrets_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> WorkflowKey {
        WorkflowKey::derive(&self.owner, &self.name)
    }

    pub fn has_secrets(&self) -> bool {
        !self.secrets_url.is_empty()
    }
}
