//! Audit trail DTOs

use domain_audit::AuditLogEntry;
use serde::{Deserialize, Serialize};

/// Query parameters for audit trail reads
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of a visit's audit trail, newest first
#[derive(Debug, Serialize)]
pub struct AuditTrailResponse {
    pub entries: Vec<AuditLogEntry>,
    pub offset: u32,
    pub limit: u32,
}
