//! Registry events
//!
//! Every state change of the registry contract is emitted as a log. Logs
//! are decoded into [`Event`]s, which carry their chain position so they can
//! be applied in the order the registry produced them.

use crate::ids::{DonId, Owner, WorkflowId, WorkflowKey};
use crate::position::ChainPosition;
use crate::workflow::{WorkflowRecord, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminator for registry events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    WorkflowRegistered,
    WorkflowActivated,
    WorkflowPaused,
    WorkflowUpdated,
    WorkflowDeleted,
    ForceUpdateSecrets,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::WorkflowRegistered,
        EventType::WorkflowActivated,
        EventType::WorkflowPaused,
        EventType::WorkflowUpdated,
        EventType::WorkflowDeleted,
        EventType::ForceUpdateSecrets,
    ];

    /// Log name as emitted by the registry contract
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::WorkflowRegistered => "WorkflowRegisteredV1",
            EventType::WorkflowActivated => "WorkflowActivatedV1",
            EventType::WorkflowPaused => "WorkflowPausedV1",
            EventType::WorkflowUpdated => "WorkflowUpdatedV1",
            EventType::WorkflowDeleted => "WorkflowDeletedV1",
            EventType::ForceUpdateSecrets => "WorkflowForceUpdateSecretsRequestedV1",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPayload {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub don_id: DonId,
    pub status: WorkflowStatus,
    pub name: String,
    #[serde(default)]
    pub binary_url: String,
    #[serde(default)]
    pub config_url: String,
    #[serde(default)]
    pub secrets_url: String,
}

impl From<&WorkflowRecord> for RegisteredPayload {
    fn from(record: &WorkflowRecord) -> Self {
        Self {
            workflow_id: record.id,
            owner: record.owner,
            don_id: record.don_id,
            status: record.status,
            name: record.name.clone(),
            binary_url: record.binary_url.clone(),
            config_url: record.config_url.clone(),
            secrets_url: record.secrets_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatedPayload {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub don_id: DonId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PausedPayload {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub don_id: DonId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedPayload {
    pub old_workflow_id: WorkflowId,
    pub new_workflow_id: WorkflowId,
    pub owner: Owner,
    pub don_id: DonId,
    pub name: String,
    #[serde(default)]
    pub binary_url: String,
    #[serde(default)]
    pub config_url: String,
    #[serde(default)]
    pub secrets_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedPayload {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub don_id: DonId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceUpdateSecretsPayload {
    pub owner: Owner,
    pub name: String,
    pub secrets_url: String,
}

/// Variant-specific event data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Registered(RegisteredPayload),
    Activated(ActivatedPayload),
    Paused(PausedPayload),
    Updated(UpdatedPayload),
    Deleted(DeletedPayload),
    ForceUpdateSecrets(ForceUpdateSecretsPayload),
}

/// A decoded registry event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Where the log sits in the ledger
    pub position: ChainPosition,

    pub payload: EventPayload,
}

impl Event {
    pub fn new(position: ChainPosition, payload: EventPayload) -> Self {
        Self { position, payload }
    }

    /// Synthesize a `Registered` event for a workflow found during backfill.
    pub fn registered_from(record: &WorkflowRecord, position: ChainPosition) -> Self {
        Self::new(position, EventPayload::Registered(record.into()))
    }

    pub fn event_type(&self) -> EventType {
        match &self.payload {
            EventPayload::Registered(_) => EventType::WorkflowRegistered,
            EventPayload::Activated(_) => EventType::WorkflowActivated,
            EventPayload::Paused(_) => EventType::WorkflowPaused,
            EventPayload::Updated(_) => EventType::WorkflowUpdated,
            EventPayload::Deleted(_) => EventType::WorkflowDeleted,
            EventPayload::ForceUpdateSecrets(_) => EventType::ForceUpdateSecrets,
        }
    }

    pub fn owner(&self) -> &Owner {
        match &self.payload {
            EventPayload::Registered(p) => &p.owner,
            EventPayload::Activated(p) => &p.owner,
            EventPayload::Paused(p) => &p.owner,
            EventPayload::Updated(p) => &p.owner,
            EventPayload::Deleted(p) => &p.owner,
            EventPayload::ForceUpdateSecrets(p) => &p.owner,
        }
    }

    pub fn workflow_name(&self) -> &str {
        match &self.payload {
            EventPayload::Registered(p) => &p.name,
            EventPayload::Activated(p) => &p.name,
            EventPayload::Paused(p) => &p.name,
            EventPayload::Updated(p) => &p.name,
            EventPayload::Deleted(p) => &p.name,
            EventPayload::ForceUpdateSecrets(p) => &p.name,
        }
    }

    pub fn workflow_key(&self) -> WorkflowKey {
        WorkflowKey::derive(self.owner(), self.workflow_name())
    }

    /// DON the event is addressed to; secrets requests are not DON scoped.
    pub fn don_id(&self) -> Option<DonId> {
        match &self.payload {
            EventPayload::Registered(p) => Some(p.don_id),
            EventPayload::Activated(p) => Some(p.don_id),
            EventPayload::Paused(p) => Some(p.don_id),
            EventPayload::Updated(p) => Some(p.don_id),
            EventPayload::Deleted(p) => Some(p.don_id),
            EventPayload::ForceUpdateSecrets(_) => None,
        }
    }
}
