//! Typed wrappers for the dashboard's backend endpoints.

use tracing::debug;

use super::{ApiClient, ApiError, ApiRequest};
use crate::models::{
    AcceptInvitation, CreateInvitation, CreatePhaseTemplate, Invitation, InvitationsResponse,
    MeResponse, PhaseTemplate, PhaseTemplateResponse, PhaseTemplatesResponse, RegisterWithTenant,
    StudentsResponse, Tenant, UpdatePhaseTemplate, User,
};

/// Default page size for student listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

#[derive(serde::Deserialize)]
struct TenantResponse {
    tenant: Tenant,
}

#[derive(serde::Serialize)]
struct UpdateTenant<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(serde::Serialize)]
struct VerifyEmail<'a> {
    token: &'a str,
}

impl ApiClient {
    // ===== Identity =====

    /// Fetch the identity behind the current access token.
    pub async fn fetch_me(&self) -> Result<User, ApiError> {
        let me: MeResponse = self.get("/me").await?;
        Ok(me.user)
    }

    /// Create an account together with its tenant. The backend emails a
    /// verification code.
    pub async fn register_with_tenant(&self, body: &RegisterWithTenant) -> Result<(), ApiError> {
        let request = ApiRequest::post("/users/register-with-tenant").json(body)?;
        self.send_public(&request).await.map(|_| ())
    }

    /// Confirm an account with the emailed verification code.
    pub async fn verify_email(&self, code: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/users/verify").json(&VerifyEmail { token: code })?;
        self.send_public(&request).await.map(|_| ())
    }

    // ===== Students =====

    pub async fn fetch_students(
        &self,
        tenant_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<StudentsResponse, ApiError> {
        let request = ApiRequest::get(format!("/tenants/{}/students", tenant_id))
            .query("page", page.max(1))
            .query("limit", limit);
        let response: StudentsResponse = self.get_request(request).await?;
        debug!(tenant_id, count = response.students.len(), "Fetched students");
        Ok(response)
    }

    // ===== Invitations =====

    pub async fn fetch_invitations(&self, tenant_id: &str) -> Result<Vec<Invitation>, ApiError> {
        let response: InvitationsResponse = self
            .get(&format!("/tenants/{}/invitations", tenant_id))
            .await?;
        Ok(response.invitations)
    }

    pub async fn send_invitation(&self, tenant_id: &str, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(format!("/tenants/{}/invitations", tenant_id)).json(
            &CreateInvitation {
                email: email.to_string(),
            },
        )?;
        self.execute(request).await
    }

    pub async fn resend_invitation(&self, invitation_id: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::post(format!("/invitations/{}/resend", invitation_id)))
            .await
    }

    pub async fn cancel_invitation(&self, invitation_id: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(format!("/invitations/{}", invitation_id)))
            .await
    }

    /// Accept an invitation by its emailed token, creating the student
    /// account. Works without a session.
    pub async fn accept_invitation(&self, token: &str, body: &AcceptInvitation) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::InvalidRequest("invitation token is required".to_string()));
        }
        let request = ApiRequest::post(format!("/invitations/{}/accept", token)).json(body)?;
        self.send_public(&request).await.map(|_| ())
    }

    // ===== Phase templates =====

    pub async fn fetch_phase_templates(
        &self,
        tenant_id: &str,
        active_only: bool,
    ) -> Result<Vec<PhaseTemplate>, ApiError> {
        let request = ApiRequest::get(format!("/tenants/{}/phase-templates", tenant_id))
            .query("activeOnly", active_only);
        let response: PhaseTemplatesResponse = self.get_request(request).await?;
        Ok(response.phase_templates)
    }

    pub async fn create_phase_template(
        &self,
        tenant_id: &str,
        data: &CreatePhaseTemplate,
    ) -> Result<PhaseTemplate, ApiError> {
        let response: PhaseTemplateResponse = self
            .post(&format!("/tenants/{}/phase-templates", tenant_id), data)
            .await?;
        Ok(response.phase_template)
    }

    pub async fn update_phase_template(
        &self,
        phase_template_id: &str,
        data: &UpdatePhaseTemplate,
    ) -> Result<PhaseTemplate, ApiError> {
        if data.is_empty() {
            return Err(ApiError::InvalidRequest("no fields to update".to_string()));
        }
        let response: PhaseTemplateResponse = self
            .put(&format!("/phase-templates/{}", phase_template_id), data)
            .await?;
        Ok(response.phase_template)
    }

    pub async fn delete_phase_template(&self, phase_template_id: &str) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(format!("/phase-templates/{}", phase_template_id)))
            .await
    }

    // ===== Tenant =====

    pub async fn update_tenant(
        &self,
        tenant_id: &str,
        name: &str,
        description: &str,
    ) -> Result<Tenant, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidRequest("tenant name is required".to_string()));
        }
        let response: TenantResponse = self
            .patch(
                &format!("/tenants/{}", tenant_id),
                &UpdateTenant {
                    name,
                    description: description.trim(),
                },
            )
            .await?;
        Ok(response.tenant)
    }
}
