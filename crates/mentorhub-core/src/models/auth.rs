use serde::{Deserialize, Serialize};

use super::{Role, User};
use crate::auth::CredentialPair;

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response body of `POST /sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: String,
}

impl SignInResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair::new(self.token.clone(), self.refresh_token.clone())
    }

    /// The identity carried by the sign-in payload. Tenant memberships are
    /// only returned by `/me`.
    pub fn user(&self, email: &str) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: email.to_string(),
            role: self.role,
            avatar: self.avatar.clone(),
            created_at: self.created_at.clone(),
            user_tenants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response body of `PATCH /token/refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl From<RefreshResponse> for CredentialPair {
    fn from(r: RefreshResponse) -> Self {
        CredentialPair::new(r.token, r.refresh_token)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTenant {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /users/register-with-tenant`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterWithTenant {
    pub user: NewUser,
    pub tenant: NewTenant,
}
