use crate::error::StoreError;
use crate::types::{AuditAction, AuditEntry, AuditFilter, AuditId, SubjectRef};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

pub const AUDIT_ALERT_TARGET: &str = "waypost::audit_alert";

pub trait AuditRepository {
    fn append(&self, entry: &AuditEntry) -> Result<(), StoreError>;
    /// Newest first.
    fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;
}

/// Best-effort recorder. A failed write never reaches the caller; it is logged
/// on the alert target and counted.
#[derive(Debug, Default)]
pub struct AuditTrail {
    alerts: AtomicU64,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// `write` persists the entry, typically through a freshly opened store so
    /// the entry lands outside the primary transaction.
    pub fn record<W>(
        &self,
        write: W,
        actor: &str,
        action: AuditAction,
        subject: SubjectRef,
        detail: Value,
    ) where
        W: FnOnce(&AuditEntry) -> Result<(), StoreError>,
    {
        let entry = AuditEntry {
            id: AuditId::generate(),
            actor: actor.to_string(),
            action,
            subject,
            at: Utc::now(),
            detail,
        };
        match write(&entry) {
            Ok(()) => tracing::debug!(action = ?entry.action, subject = %entry.subject, "audit recorded"),
            Err(err) => self.alert(&entry, &err),
        }
    }

    pub fn alert_count(&self) -> u64 {
        self.alerts.load(Ordering::Relaxed)
    }

    fn alert(&self, entry: &AuditEntry, err: &StoreError) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            target: AUDIT_ALERT_TARGET,
            actor = %entry.actor,
            action = ?entry.action,
            subject = %entry.subject,
            error = %err,
            "audit write failed"
        );
    }
}
