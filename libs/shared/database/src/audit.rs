// =====================================================================================
// AUDIT QUEUE - NON-BLOCKING DOMAIN EVENT LOG
// =====================================================================================
//
// Handlers push entries with `AuditQueue::record`, which never awaits the store.
// A single worker drains the bounded channel and writes each entry with a small
// exponential-backoff retry. Entries are dropped, with a warning, when the queue is
// full or every attempt failed.
//
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::error::current_request_id;

use crate::supabase::{StoreError, SupabaseClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    AppointmentStatusChanged,
    VisitStarted,
    VisitFinished,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AppointmentStatusChanged => "APPOINTMENT_STATUS_CHANGED",
            AuditAction::VisitStarted => "VISIT_STARTED",
            AuditAction::VisitFinished => "VISIT_FINISHED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub clinic_id: Uuid,
    pub actor_user_id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub meta: Value,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Captures the current request id, so build entries inside the request task.
    pub fn new(
        clinic_id: Uuid,
        actor_user_id: Uuid,
        action: AuditAction,
        entity_type: &str,
        entity_id: Uuid,
        meta: Value,
    ) -> Self {
        Self {
            clinic_id,
            actor_user_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            meta,
            request_id: current_request_id(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, entry: &AuditEntry) -> Result<(), StoreError>;
}

#[async_trait]
impl AuditSink for SupabaseClient {
    async fn write(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let _: Value = self
            .insert(
                "audit_logs",
                json!({
                    "clinic_id": entry.clinic_id,
                    "actor_user_id": entry.actor_user_id,
                    "action": entry.action,
                    "entity_type": entry.entity_type,
                    "entity_id": entry.entity_id,
                    "meta": entry.meta,
                    "request_id": entry.request_id,
                    "created_at": entry.created_at,
                }),
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Clone)]
pub struct AuditQueue {
    sender: mpsc::Sender<AuditEntry>,
}

pub struct AuditWorker {
    receiver: mpsc::Receiver<AuditEntry>,
    sink: Arc<dyn AuditSink>,
    policy: RetryPolicy,
}

impl AuditQueue {
    pub fn new(sink: Arc<dyn AuditSink>, capacity: usize, policy: RetryPolicy) -> (Self, AuditWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self { sender },
            AuditWorker {
                receiver,
                sink,
                policy,
            },
        )
    }

    /// Creates the queue and spawns its worker on the current runtime.
    pub fn start(sink: Arc<dyn AuditSink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (queue, worker) = Self::new(sink, capacity, RetryPolicy::default());
        let handle = tokio::spawn(worker.run());
        (queue, handle)
    }

    /// Enqueues without waiting. Returns `false` when the entry was dropped.
    pub fn record(&self, entry: AuditEntry) -> bool {
        info!(
            action = entry.action.as_str(),
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            actor = %entry.actor_user_id,
            request_id = %entry.request_id,
            "AUDIT: {}", entry.action.as_str()
        );

        match self.sender.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                warn!(
                    action = entry.action.as_str(),
                    entity_id = %entry.entity_id,
                    "Audit queue full, dropping entry"
                );
                false
            }
            Err(TrySendError::Closed(entry)) => {
                warn!(
                    action = entry.action.as_str(),
                    entity_id = %entry.entity_id,
                    "Audit worker stopped, dropping entry"
                );
                false
            }
        }
    }
}

impl AuditWorker {
    pub async fn run(mut self) {
        debug!("Audit worker started");
        while let Some(entry) = self.receiver.recv().await {
            deliver(self.sink.as_ref(), &entry, self.policy).await;
        }
        debug!("Audit worker stopped, all senders dropped");
    }
}

/// Writes one entry, retrying with exponential backoff. Returns whether it was stored.
pub async fn deliver(sink: &dyn AuditSink, entry: &AuditEntry, policy: RetryPolicy) -> bool {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match sink.write(entry).await {
            Ok(()) => return true,
            Err(e) if attempt < attempts => {
                debug!(attempt, "Audit write failed, retrying: {}", e);
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
            Err(e) => {
                warn!(
                    action = entry.action.as_str(),
                    entity_id = %entry.entity_id,
                    attempts,
                    "Dropping audit entry after failed writes: {}", e
                );
            }
        }
    }

    false
}
