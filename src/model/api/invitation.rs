use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::invitation::Invitation};

/// One row of an invitation batch. Missing fields are reported, not rejected outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitationRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Outcome of an invitation batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationReport {
    pub total_rows: usize,
    pub successful_invitations: usize,
    pub failed_invitations: usize,
    pub duplicate_emails: Vec<String>,
    pub errors: Vec<String>,
}

impl InvitationReport {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    pub fn succeeded(&mut self) {
        self.successful_invitations += 1;
    }

    pub fn failed(&mut self, row: usize, reason: impl Into<String>) {
        self.failed_invitations += 1;
        self.errors.push(format!("Row {row}: {}", reason.into()));
    }

    pub fn duplicate(&mut self, row: usize, email: &str) {
        self.duplicate_emails.push(email.to_string());
        self.failed(row, format!("Active invitation already exists for {email}"));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationDescription {
    pub id: ApiId,
    pub email: String,
    pub token: String,
    pub is_used: bool,
    pub election_event_id: ApiId,
    pub first_name: String,
    pub last_name: String,
    pub invited_by: Option<ApiId>,
    pub created_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationDescription {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id.into(),
            election_event_id: invitation.election_event_id.into(),
            invited_by: invitation.invited_by.map(Into::into),
            email: invitation.invitation.email,
            token: invitation.invitation.token,
            is_used: invitation.invitation.is_used,
            first_name: invitation.invitation.first_name,
            last_name: invitation.invitation.last_name,
            created_at: invitation.invitation.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_duplicates_as_failures() {
        let mut report = InvitationReport::new(3);
        report.succeeded();
        report.duplicate(2, "dup@example.com");
        report.failed(3, "Email is required");
        assert_eq!(report.successful_invitations, 1);
        assert_eq!(report.failed_invitations, 2);
        assert_eq!(report.duplicate_emails, vec!["dup@example.com".to_string()]);
        assert_eq!(report.errors.len(), 2);
    }
}
