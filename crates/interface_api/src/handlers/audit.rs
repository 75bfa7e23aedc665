//! Audit trail handlers

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use core_kernel::{Actor, Capability, VisitId};
use domain_audit::AuditPage;
use uuid::Uuid;

use crate::auth::require_capability;
use crate::dto::audit::*;
use crate::{error::ApiError, AppState};

/// Returns a page of the visit's audit trail, newest first
pub async fn visit_trail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditTrailResponse>, ApiError> {
    require_capability(&actor, Capability::ViewAuditTrail)?;
    let page = AuditPage::new(
        query.offset.unwrap_or(0),
        query.limit.unwrap_or(AuditPage::DEFAULT_LIMIT),
    );
    let entries = state
        .audit
        .list_for_visit(VisitId::from_uuid(id), page)
        .await?;
    Ok(Json(AuditTrailResponse {
        entries,
        offset: page.offset,
        limit: page.limit,
    }))
}
