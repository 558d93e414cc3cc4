use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Cancelled,
    Expired,
}

impl InvitationStatus {
    /// Only pending invitations can be resent or cancelled.
    pub fn is_actionable(&self) -> bool {
        matches!(self, InvitationStatus::Pending)
    }
}

impl std::fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "Pending",
            InvitationStatus::Accepted => "Accepted",
            InvitationStatus::Cancelled => "Cancelled",
            InvitationStatus::Expired => "Expired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct InvitationTenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Inviter {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Invitation {
    pub id: String,
    pub email: String,
    pub token: String,
    pub status: InvitationStatus,
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    #[serde(rename = "invitedBy")]
    pub invited_by: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(default)]
    pub tenant: Option<InvitationTenant>,
    #[serde(default)]
    pub inviter: Option<Inviter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationsResponse {
    pub invitations: Vec<Invitation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInvitation {
    pub email: String,
}

/// Body of `POST /invitations/{token}/accept`.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptInvitation {
    pub name: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invitation() {
        let json = r#"{"invitations":[{"id":"i1","email":"new@example.com","token":"tok","status":"PENDING","tenantId":"t1","invitedBy":"u1","expiresAt":"2025-05-01","createdAt":"2025-04-01","updatedAt":"2025-04-01","inviter":{"id":"u1","name":"Ana","email":"ana@example.com"}}]}"#;
        let resp: InvitationsResponse = serde_json::from_str(json).expect("parse");
        let inv = &resp.invitations[0];
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert!(inv.status.is_actionable());
        assert!(inv.tenant.is_none());
        assert_eq!(inv.inviter.as_ref().map(|i| i.name.as_str()), Some("Ana"));
    }

    #[test]
    fn test_status_actionable() {
        assert!(!InvitationStatus::Accepted.is_actionable());
        assert!(!InvitationStatus::Cancelled.is_actionable());
        assert!(!InvitationStatus::Expired.is_actionable());
        assert_eq!(InvitationStatus::Expired.to_string(), "Expired");
    }
}
