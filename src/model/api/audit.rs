use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::audit::AuditAction};

/// The vote an audit entry refers to, resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSummary {
    pub vote_id: ApiId,
    pub voter_email: Option<String>,
    pub candidate_name: Option<String>,
    pub election_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: ApiId,
    pub action: AuditAction,
    pub performed_by_email: Option<String>,
    pub details: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub vote_details: Option<VoteSummary>,
}
