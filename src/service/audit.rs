use chrono::Utc;
use log::{error, info};
use mongodb::bson::Document;

use crate::model::{
    api::RequestContext,
    common::audit::{AuditAction, AuditEntry},
    mongodb::Id,
    store::AuditLog,
};

/// Writes the audit trail.
///
/// A failed write is logged and otherwise ignored: the audited operation has
/// already happened by the time it is recorded.
pub struct Auditor<'a> {
    log: &'a dyn AuditLog,
}

impl<'a> Auditor<'a> {
    pub fn new(log: &'a dyn AuditLog) -> Self {
        Self { log }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        actor: Id,
        context: &RequestContext,
        details: Document,
    ) {
        let entry = AuditEntry {
            action,
            actor,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            details,
            timestamp: Utc::now(),
        };
        match self.log.append(entry).await {
            Ok(()) => info!("Audit: {action} by {actor}"),
            Err(e) => error!("Failed to write audit entry \"{action}\" by {actor}: {e}"),
        }
    }
}
