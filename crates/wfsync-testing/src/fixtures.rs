//! Deterministic workflow fixtures

use wfsync_types::{DonId, Owner, WorkflowId, WorkflowRecord, WorkflowStatus};

/// Test owner address
pub fn owner() -> Owner {
    Owner::from_bytes([0x42; 20])
}

/// A workflow whose artifacts are derived from its name and version, so its
/// id always matches what the fetcher serves for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFixture {
    pub owner: Owner,
    pub name: String,
    pub don_id: DonId,
    pub version: u32,
    secrets: bool,
}

impl WorkflowFixture {
    pub fn new(name: impl Into<String>, don_id: impl Into<DonId>) -> Self {
        Self {
            owner: owner(),
            name: name.into(),
            don_id: don_id.into(),
            version: 1,
            secrets: true,
        }
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    pub fn without_secrets(mut self) -> Self {
        self.secrets = false;
        self
    }

    /// The same workflow with the next version of its binary
    pub fn next_version(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }

    pub fn has_secrets(&self) -> bool {
        self.secrets
    }

    fn base_url(&self) -> String {
        format!("https://artifacts.test/{}/{}", self.owner, self.name)
    }

    pub fn binary(&self) -> Vec<u8> {
        format!("binary:{}:v{}", self.name, self.version).into_bytes()
    }

    pub fn config(&self) -> Vec<u8> {
        format!("config:{}", self.name).into_bytes()
    }

    pub fn binary_url(&self) -> String {
        format!("{}/v{}/binary.wasm", self.base_url(), self.version)
    }

    pub fn config_url(&self) -> String {
        format!("{}/config.yaml", self.base_url())
    }

    pub fn secrets_url(&self) -> String {
        if self.secrets {
            format!("{}/secrets.json", self.base_url())
        } else {
            String::new()
        }
    }

    pub fn workflow_id(&self) -> WorkflowId {
        WorkflowId::derive(
            &self.owner,
            &self.name,
            &self.binary(),
            &self.config(),
            &self.secrets_url(),
        )
    }

    pub fn record(&self, status: WorkflowStatus) -> WorkflowRecord {
        WorkflowRecord {
            id: self.workflow_id(),
            owner: self.owner,
            name: self.name.clone(),
            don_id: self.don_id,
            status,
            binary_url: self.binary_url(),
            config_url: self.config_url(),
            secrets_url: self.secrets_url(),
        }
    }
}
