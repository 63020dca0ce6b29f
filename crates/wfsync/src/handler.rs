//! Applying registry events to local state
//!
//! [`WorkflowEventHandler`] turns each decoded [`Event`] into spec writes,
//! secrets cache updates and engine lifecycle calls. Every branch tolerates
//! redelivery of an event it has already applied.

use crate::config::HandlerConfig;
use crate::error::{HandlerError, HandlerResult};
use crate::fetcher::SecretsFetcher;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use wfsync_engine::{
    EngineError, EngineFactory, EngineRegistry, EngineRequest, HealthReport, Service,
};
use wfsync_store::{SecretsStorage, SpecStorage, WorkflowStore};
use wfsync_types::{
    secrets_url_hash, ActivatedPayload, DeletedPayload, Event, EventPayload, EventType,
    ForceUpdateSecretsPayload, Owner, PausedPayload, RegisteredPayload, SecretsId,
    UpdatedPayload, WorkflowId, WorkflowSpec, WorkflowStatus,
};

/// Applies one registry event
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> HandlerResult<()>;

    /// Health of whatever the handler runs on behalf of the syncer
    fn health_report(&self) -> HealthReport {
        HealthReport::new()
    }
}

/// Notifications published as events are applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncNotification {
    SpecPersisted {
        owner: Owner,
        name: String,
        workflow_id: WorkflowId,
        status: WorkflowStatus,
    },
    SpecDeleted {
        owner: Owner,
        name: String,
    },
    EngineStarted {
        name: String,
        workflow_id: WorkflowId,
    },
    EngineStopped {
        name: String,
    },
    SecretsUpdated {
        url: String,
        secrets_id: SecretsId,
    },
    ApplyFailed {
        event_type: EventType,
        name: String,
        reason: String,
    },
}

/// How eagerly to refresh cached secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecretsRefresh {
    /// Fetch only when nothing is cached for the URL
    IfMissing,
    /// Always fetch, writing only when the content changed
    Force,
}

/// The production [`EventHandler`]
pub struct WorkflowEventHandler {
    store: Arc<dyn WorkflowStore>,
    fetcher: Arc<dyn SecretsFetcher>,
    factory: Arc<dyn EngineFactory>,
    engines: Arc<EngineRegistry>,
    config: HandlerConfig,
    notifications: broadcast::Sender<SyncNotification>,
}

impl WorkflowEventHandler {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        fetcher: Arc<dyn SecretsFetcher>,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let config = HandlerConfig::default();
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            store,
            fetcher,
            factory,
            engines: Arc::new(EngineRegistry::new()),
            config,
            notifications,
        }
    }

    /// Share an engine registry owned elsewhere
    pub fn with_engine_registry(mut self, engines: Arc<EngineRegistry>) -> Self {
        self.engines = engines;
        self
    }

    pub fn with_config(mut self, config: HandlerConfig) -> Self {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        self.notifications = notifications;
        self.config = config;
        self
    }

    pub fn engines(&self) -> Arc<EngineRegistry> {
        self.engines.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    fn notify(&self, notification: SyncNotification) {
        // No subscribers is fine
        let _ = self.notifications.send(notification);
    }

    async fn persist(&self, spec: &WorkflowSpec) -> HandlerResult<()> {
        self.store.upsert_spec(spec.clone()).await?;
        self.notify(SyncNotification::SpecPersisted {
            owner: spec.owner,
            name: spec.name.clone(),
            workflow_id: spec.workflow_id,
            status: spec.status,
        });
        Ok(())
    }

    async fn require_spec(&self, owner: &Owner, name: &str) -> HandlerResult<WorkflowSpec> {
        self.store
            .get_spec(owner, name)
            .await?
            .ok_or_else(|| HandlerError::SpecNotFound {
                owner: *owner,
                name: name.to_string(),
            })
    }

    async fn workflow_registered(&self, payload: RegisteredPayload) -> HandlerResult<()> {
        let now = Utc::now();
        let existing = self.store.get_spec(&payload.owner, &payload.name).await?;

        if let Some(spec) = &existing {
            let unchanged = spec.workflow_id == payload.workflow_id
                && spec.status == payload.status
                && spec.binary_url == payload.binary_url
                && spec.config_url == payload.config_url
                && spec.secrets_url == payload.secrets_url;
            let engine_matches = spec.status.is_active() == self.engines.contains(&spec.name);
            if unchanged && engine_matches {
                debug!(workflow = %payload.name, "Workflow already registered");
                return Ok(());
            }
        }

        let mut spec = WorkflowSpec {
            workflow_id: payload.workflow_id,
            owner: payload.owner,
            name: payload.name,
            don_id: payload.don_id,
            status: payload.status,
            binary_url: payload.binary_url,
            config_url: payload.config_url,
            secrets_url: payload.secrets_url,
            secrets_id: None,
            created_at: now,
            updated_at: now,
        };
        if let Some(previous) = existing {
            spec.created_at = previous.created_at;
            if previous.secrets_url == spec.secrets_url {
                spec.secrets_id = previous.secrets_id;
            }
        }

        self.persist(&spec).await?;
        self.link_secrets(&mut spec).await?;

        if spec.status.is_active() {
            self.start_engine(&spec).await
        } else {
            self.stop_engine(&spec.name).await;
            Ok(())
        }
    }

    async fn workflow_activated(&self, payload: ActivatedPayload) -> HandlerResult<()> {
        let mut spec = self.require_spec(&payload.owner, &payload.name).await?;
        if spec.workflow_id != payload.workflow_id {
            warn!(
                workflow = %payload.name,
                event_id = %payload.workflow_id,
                spec_id = %spec.workflow_id,
                "Activation refers to a different workflow version"
            );
        }

        if !spec.status.is_active() {
            spec.status = WorkflowStatus::Active;
            spec.updated_at = Utc::now();
            self.persist(&spec).await?;
        }

        if self.engines.contains(&spec.name) {
            debug!(workflow = %spec.name, "Engine already running");
            return Ok(());
        }
        self.start_engine(&spec).await
    }

    async fn workflow_paused(&self, payload: PausedPayload) -> HandlerResult<()> {
        self.stop_engine(&payload.name).await;

        match self.store.get_spec(&payload.owner, &payload.name).await? {
            Some(mut spec) if spec.status.is_active() => {
                spec.status = WorkflowStatus::Paused;
                spec.updated_at = Utc::now();
                self.persist(&spec).await
            }
            Some(_) => Ok(()),
            None => {
                debug!(workflow = %payload.name, "Pause for unknown workflow");
                Ok(())
            }
        }
    }

    async fn workflow_updated(&self, payload: UpdatedPayload) -> HandlerResult<()> {
        let mut spec = self.require_spec(&payload.owner, &payload.name).await?;

        if spec.workflow_id == payload.new_workflow_id {
            debug!(workflow = %spec.name, "Update already applied");
            if spec.status.is_active() && !self.engines.contains(&spec.name) {
                return self.start_engine(&spec).await;
            }
            return Ok(());
        }

        self.stop_engine(&spec.name).await;

        if spec.secrets_url != payload.secrets_url {
            spec.secrets_id = None;
        }
        spec.workflow_id = payload.new_workflow_id;
        spec.don_id = payload.don_id;
        spec.binary_url = payload.binary_url;
        spec.config_url = payload.config_url;
        spec.secrets_url = payload.secrets_url;
        spec.updated_at = Utc::now();

        self.persist(&spec).await?;
        self.link_secrets(&mut spec).await?;

        if spec.status.is_active() {
            self.start_engine(&spec).await?;
        }
        Ok(())
    }

    async fn workflow_deleted(&self, payload: DeletedPayload) -> HandlerResult<()> {
        self.stop_engine(&payload.name).await;

        if self
            .store
            .delete_spec(&payload.owner, &payload.name)
            .await?
        {
            self.notify(SyncNotification::SpecDeleted {
                owner: payload.owner,
                name: payload.name,
            });
        }
        Ok(())
    }

    async fn force_update_secrets(&self, payload: ForceUpdateSecretsPayload) -> HandlerResult<()> {
        let id = self
            .sync_secrets(&payload.owner, &payload.secrets_url, SecretsRefresh::Force)
            .await?;

        // Point a spec that references this URL at the cached row
        if let Some(mut spec) = self.store.get_spec(&payload.owner, &payload.name).await? {
            if spec.secrets_url == payload.secrets_url && spec.secrets_id != Some(id) {
                spec.secrets_id = Some(id);
                spec.updated_at = Utc::now();
                self.persist(&spec).await?;
            }
        }
        Ok(())
    }

    /// Make sure the spec's secrets are cached and linked.
    async fn link_secrets(&self, spec: &mut WorkflowSpec) -> HandlerResult<()> {
        if !spec.has_secrets() {
            return Ok(());
        }

        let id = self
            .sync_secrets(&spec.owner, &spec.secrets_url, SecretsRefresh::IfMissing)
            .await?;
        if spec.secrets_id != Some(id) {
            spec.secrets_id = Some(id);
            self.persist(spec).await?;
        }
        Ok(())
    }

    async fn sync_secrets(
        &self,
        owner: &Owner,
        url: &str,
        refresh: SecretsRefresh,
    ) -> HandlerResult<SecretsId> {
        let url_hash = secrets_url_hash(owner, url);
        let cached = self.store.get_secrets(url).await?;

        if let Some(record) = &cached {
            if record.url_hash != url_hash {
                return Err(HandlerError::SecretsNotAuthorized {
                    url: url.to_string(),
                });
            }
            if refresh == SecretsRefresh::IfMissing {
                return Ok(record.id);
            }
        }

        let fetched = self.fetcher.fetch(url).await?;
        let contents = String::from_utf8(fetched).map_err(|_| HandlerError::InvalidSecrets {
            url: url.to_string(),
        })?;

        if let Some(record) = cached {
            if !record.differs_from(contents.as_bytes()) {
                debug!(url = %url, "Secrets unchanged");
                return Ok(record.id);
            }
        }

        let id = self.store.put_secrets(url, &url_hash, &contents).await?;
        info!(url = %url, secrets_id = %id, "Secrets updated");
        self.notify(SyncNotification::SecretsUpdated {
            url: url.to_string(),
            secrets_id: id,
        });
        Ok(id)
    }

    /// Build and start an engine for `spec`, replacing any running one.
    async fn start_engine(&self, spec: &WorkflowSpec) -> HandlerResult<()> {
        let raw_binary = self.fetcher.fetch(&spec.binary_url).await?;
        let binary = BASE64
            .decode(String::from_utf8_lossy(&raw_binary).trim())
            .map_err(|e| HandlerError::InvalidBinary {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        let config = if spec.config_url.is_empty() {
            Vec::new()
        } else {
            self.fetcher.fetch(&spec.config_url).await?
        };

        if self.config.verify_workflow_id {
            let computed = WorkflowId::derive(
                &spec.owner,
                &spec.name,
                &binary,
                &config,
                &spec.secrets_url,
            );
            if computed != spec.workflow_id {
                return Err(HandlerError::WorkflowIdMismatch {
                    name: spec.name.clone(),
                    expected: spec.workflow_id,
                    computed,
                });
            }
        }

        let engine = self
            .factory
            .create(EngineRequest {
                workflow_id: spec.workflow_id,
                owner: spec.owner,
                name: spec.name.clone(),
                config,
                binary,
            })
            .await?;

        engine
            .start()
            .await
            .map_err(|source| EngineError::Start {
                name: spec.name.clone(),
                source,
            })?;

        if let Some(previous) = self.engines.replace(spec.name.clone(), engine) {
            if let Err(e) = previous.close().await {
                warn!(workflow = %spec.name, error = %e, "Failed to close replaced engine");
            }
        }

        info!(workflow = %spec.name, workflow_id = %spec.workflow_id, "Engine started");
        self.notify(SyncNotification::EngineStarted {
            name: spec.name.clone(),
            workflow_id: spec.workflow_id,
        });
        Ok(())
    }

    /// Stop and unregister the engine for `name`, if one is running.
    async fn stop_engine(&self, name: &str) -> bool {
        let engine = match self.engines.unregister(name) {
            Ok(engine) => engine,
            Err(_) => return false,
        };

        // The handle is already out of the registry, a failed close only leaks it
        if let Err(e) = engine.close().await {
            warn!(workflow = %name, error = %e, "Failed to close engine");
        }

        info!(workflow = %name, "Engine stopped");
        self.notify(SyncNotification::EngineStopped {
            name: name.to_string(),
        });
        true
    }
}

#[async_trait]
impl EventHandler for WorkflowEventHandler {
    #[instrument(
        skip(self, event),
        fields(
            event_type = %event.event_type(),
            workflow = %event.workflow_name(),
            position = %event.position,
        )
    )]
    async fn handle(&self, event: Event) -> HandlerResult<()> {
        let event_type = event.event_type();
        let name = event.workflow_name().to_string();

        let result = match event.payload {
            EventPayload::Registered(p) => self.workflow_registered(p).await,
            EventPayload::Activated(p) => self.workflow_activated(p).await,
            EventPayload::Paused(p) => self.workflow_paused(p).await,
            EventPayload::Updated(p) => self.workflow_updated(p).await,
            EventPayload::Deleted(p) => self.workflow_deleted(p).await,
            EventPayload::ForceUpdateSecrets(p) => self.force_update_secrets(p).await,
        };

        if let Err(e) = &result {
            self.notify(SyncNotification::ApplyFailed {
                event_type,
                name,
                reason: e.to_string(),
            });
        }
        result
    }

    fn health_report(&self) -> HealthReport {
        self.engines.health_report()
    }
}

impl std::fmt::Debug for WorkflowEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEventHandler")
            .field("engines", &self.engines)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
