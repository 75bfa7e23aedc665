//! Audit domain ports
//!
//! # Architecture
//!
//! `AuditSink` has exactly two operations: append and read. Update and
//! delete do not exist on the port, and the adapters behind it reject
//! them at the storage layer as well, so no code path can rewrite
//! history. In the usual flow adapters write entries inline within the
//! transaction of the mutation being recorded; `append` is the same
//! write exposed for callers that audit outside a ledger transaction.

use async_trait::async_trait;

use core_kernel::{DomainPort, VisitId};

use crate::entry::AuditLogEntry;
use crate::error::AuditError;

/// Page request for audit reads
#[derive(Debug, Clone, Copy)]
pub struct AuditPage {
    /// Entries to skip
    pub offset: u32,
    /// Maximum entries to return
    pub limit: u32,
}

impl AuditPage {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    /// Creates a page request with the limit clamped to the allowed range
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for AuditPage {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Append-only storage port for the audit trail
#[async_trait]
pub trait AuditSink: DomainPort {
    /// Appends one entry to the trail
    async fn append(&self, entry: AuditLogEntry) -> Result<AuditLogEntry, AuditError>;

    /// Lists a visit's trail, newest first
    async fn list_for_visit(
        &self,
        visit_id: VisitId,
        page: AuditPage,
    ) -> Result<Vec<AuditLogEntry>, AuditError>;
}
