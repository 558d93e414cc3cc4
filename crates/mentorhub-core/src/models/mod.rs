//! Data models for mentorhub entities.
//!
//! - `User`, `Role`, `Tenant`: the signed-in identity and its memberships
//! - `Student`, `Pagination`: tenant student listings
//! - `Invitation`, `InvitationStatus`: student invitations
//! - `PhaseTemplate` and its create/update bodies
//! - Auth payloads for `/sessions`, `/token/refresh` and sign-up

pub mod auth;
pub mod invitation;
pub mod phase_template;
pub mod student;
pub mod user;

pub use auth::{
    NewTenant, NewUser, RefreshRequest, RefreshResponse, RegisterWithTenant, SignInRequest,
    SignInResponse,
};
pub use invitation::{
    AcceptInvitation, CreateInvitation, Invitation, InvitationStatus, InvitationTenant,
    InvitationsResponse, Inviter,
};
pub use phase_template::{
    CreatePhaseTemplate, PhaseTemplate, PhaseTemplateResponse, PhaseTemplatesResponse,
    UpdatePhaseTemplate,
};
pub use student::{Pagination, Student, StudentsResponse};
pub use user::{MeResponse, Role, Tenant, User, UserTenant};
