use serde::{Deserialize, Serialize};

/// Platform role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Mentor,
    Student,
    /// A role this client does not know yet.
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::Mentor => "Mentor",
            Role::Student => "Student",
            Role::Unknown => "Unknown",
        }
    }

    /// Owners and mentors manage students, invitations and templates.
    pub fn is_mentor(&self) -> bool {
        matches!(self, Role::Owner | Role::Mentor)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "ownerId", default)]
    pub owner_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct UserTenant {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub tenant: Tenant,
}

/// The signed-in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(alias = "createdAt")]
    pub created_at: String,
    #[serde(rename = "userTenants", default)]
    pub user_tenants: Vec<UserTenant>,
}

impl User {
    /// First tenant membership, which the dashboard treats as current.
    pub fn current_tenant(&self) -> Option<&Tenant> {
        self.user_tenants.first().map(|ut| &ut.tenant)
    }

    pub fn owns_tenant(&self, tenant: &Tenant) -> bool {
        tenant.owner_id.as_deref() == Some(self.id.as_str())
    }
}

/// Response body of `GET /me`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user: User,
}
