//! PostgreSQL audit sink
//!
//! Appends run in their own short transaction; the inline entries that
//! ledger mutations write share the mutating transaction instead. Reads
//! page newest first by the append sequence.

use async_trait::async_trait;
use sqlx::PgPool;

use core_kernel::{DomainPort, VisitId};
use domain_audit::{AuditError, AuditLogEntry, AuditPage, AuditSink};

use super::rows::{insert_audit_entry, AuditRow};
use super::storage_err;

/// PostgreSQL implementation of the audit port
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    /// Creates a new audit sink over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgAuditSink {}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, AuditError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        insert_audit_entry(&mut tx, &entry).await?;
        tx.commit().await.map_err(storage_err)?;

        Ok(entry)
    }

    async fn list_for_visit(
        &self,
        visit_id: VisitId,
        page: AuditPage,
    ) -> Result<Vec<AuditLogEntry>, AuditError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT entry_id, actor_id, actor_role, action, visit_id,
                   resource_kind, resource_id, metadata, ip_address,
                   user_agent, recorded_at
            FROM audit_log
            WHERE visit_id = $1
            ORDER BY seq DESC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(visit_id.as_uuid())
        .bind(page.offset as i64)
        .bind(page.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row.into_entry()?);
        }
        Ok(entries)
    }
}
