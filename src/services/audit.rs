use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entities::audit_log;
use crate::errors::ServiceError;

/// One "who changed what" record.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub entity_ref: String,
    pub meta: JsonValue,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn for_order(
        actor_id: Option<Uuid>,
        action: &str,
        order_id: Uuid,
        meta: JsonValue,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id,
            action: action.to_string(),
            entity_ref: order_ref(order_id),
            meta,
            at,
        }
    }
}

pub fn order_ref(order_id: Uuid) -> String {
    format!("order:{}", order_id)
}

/// Append-only audit trail. Writes go through the caller's transaction so an
/// entry exists exactly when the change it describes was committed.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, txn: &DatabaseTransaction, entry: AuditEntry) -> Result<(), ServiceError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DbAuditSink;

#[async_trait]
impl AuditSink for DbAuditSink {
    async fn record(&self, txn: &DatabaseTransaction, entry: AuditEntry) -> Result<(), ServiceError> {
        audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action),
            entity_ref: Set(entry.entity_ref),
            meta: Set(Some(entry.meta)),
            created_at: Set(entry.at),
        }
        .insert(txn)
        .await?;
        Ok(())
    }
}

impl DbAuditSink {
    /// Entries for one entity, oldest first.
    pub async fn trail<C: ConnectionTrait>(
        conn: &C,
        entity_ref: &str,
    ) -> Result<Vec<audit_log::Model>, ServiceError> {
        Ok(audit_log::Entity::find()
            .filter(audit_log::Column::EntityRef.eq(entity_ref))
            .order_by_asc(audit_log::Column::CreatedAt)
            .all(conn)
            .await?)
    }
}
