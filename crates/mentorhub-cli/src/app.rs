//! Application state for one CLI invocation.
//!
//! Wires the core together the way a single dashboard tab would: a
//! browser-context client on the profile cookie jar, a session store on the
//! profile's `auth` channel and a query cache for listings. Other
//! `mentorhub` processes on the same profile are the sibling tabs.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use mentorhub_core::api::{ApiClient, ExecutionContext};
use mentorhub_core::auth::{BroadcastHub, CookieJar, SessionStore, AUTH_CHANNEL_NAME};
use mentorhub_core::cache::manager::{invitations_key, phase_templates_key};
use mentorhub_core::cache::QueryCache;
use mentorhub_core::models::{
    AcceptInvitation, CreatePhaseTemplate, NewTenant, NewUser, RegisterWithTenant,
    UpdatePhaseTemplate, User,
};
use mentorhub_core::navigation::{route_decision, LogNavigator, RouteDecision};
use mentorhub_core::Config;
use tracing::{debug, warn};

use crate::display;

/// Students shown on the dashboard overview
const DASHBOARD_STUDENT_LIMIT: u32 = 5;

const WATCH_INTERVAL: Duration = Duration::from_millis(500);

pub struct App {
    config: Config,
    api: ApiClient,
    session: Arc<SessionStore>,
    cache: QueryCache,
    tenant_override: Option<String>,
}

impl App {
    pub fn new(base_url: Option<&str>, tenant_override: Option<String>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let base_url = base_url
            .map(str::to_string)
            .unwrap_or_else(|| config.resolved_base_url());
        let profile_dir = config
            .profile_dir()
            .unwrap_or_else(|_| PathBuf::from("./profile"));
        debug!(%base_url, ?profile_dir, "Configured");

        let jar = Arc::new(CookieJar::new(profile_dir.clone()));
        let api = ApiClient::new(
            &base_url,
            ExecutionContext::Browser,
            jar,
            config.request_timeout(),
        )?;

        let hub = BroadcastHub::for_profile(profile_dir);
        let session = SessionStore::new(
            api.clone(),
            hub.open(AUTH_CHANNEL_NAME),
            Arc::new(LogNavigator),
        );

        let cache_dir = config
            .query_cache_dir()
            .unwrap_or_else(|_| PathBuf::from("./cache"));
        let cache = QueryCache::new(cache_dir)?;

        Ok(Self {
            config,
            api,
            session,
            cache,
            tenant_override,
        })
    }

    // ===== Session =====

    pub async fn sign_in(&mut self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(e) => e,
            None => prompt_email(self.config.last_email.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        println!("Signing in...");
        self.session.sign_in(&email, &password).await?;
        if self.session.is_invalid_credentials().await {
            bail!("Invalid email or password");
        }

        // The sign-in payload has no tenant memberships; /me does
        self.session.resolve().await;
        let user = self.require_user().await?;

        self.config.last_email = Some(email);
        if let Some(tenant) = user.current_tenant() {
            self.config.tenant_id = Some(tenant.id.clone());
        }
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Signed in as {} ({})", user.name, user.role);
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.session.sign_out(false).await;
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "Failed to clear query cache");
        }
        println!("Signed out");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        let user = self.require_user().await?;
        display::print_user(&user);
        Ok(())
    }

    /// Stay open and follow the session until it ends here or elsewhere.
    pub async fn watch(&self) -> Result<()> {
        let user = self.require_user().await?;
        self.session.listen();
        println!("Watching session of {} (Ctrl-C to stop)", user.name);

        let mut ticker = tokio::time::interval(WATCH_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {
                    if !self.session.is_authenticated().await {
                        println!("Signed out in another window");
                        if let Err(e) = self.cache.clear() {
                            warn!(error = %e, "Failed to clear query cache");
                        }
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn route(&self, path: &str) {
        let has_token = self.api.current_token().is_some();
        match route_decision(path, has_token) {
            RouteDecision::Continue => println!("{}", path),
            RouteDecision::Redirect(to) => println!("{} -> {}", path, to),
        }
    }

    /// Resolve the stored session and return its user.
    async fn require_user(&self) -> Result<User> {
        self.session.resolve().await;
        match self.session.user().await {
            Some(user) => Ok(user),
            None => bail!("Not signed in. Run `mentorhub sign-in` first."),
        }
    }

    async fn tenant_id(&self) -> Result<String> {
        if let Some(ref id) = self.tenant_override {
            return Ok(id.clone());
        }
        let user = self.require_user().await?;
        if let Some(tenant) = user.current_tenant() {
            return Ok(tenant.id.clone());
        }
        self.config
            .tenant_id
            .clone()
            .context("No tenant for this account. Pass --tenant <id>.")
    }

    fn invalidate(&self, prefix: &str) {
        match self.cache.invalidate(prefix) {
            Ok(removed) => debug!(prefix, removed, "Invalidated cached queries"),
            Err(e) => warn!(prefix, error = %e, "Failed to invalidate cached queries"),
        }
    }

    // ===== Dashboard =====

    pub async fn dashboard(&self) -> Result<()> {
        let user = self.require_user().await?;
        let tenant_id = self.tenant_id().await?;

        let (students, invitations, templates) = futures::join!(
            self.api.fetch_students(&tenant_id, 1, DASHBOARD_STUDENT_LIMIT),
            self.api.fetch_invitations(&tenant_id),
            self.api.fetch_phase_templates(&tenant_id, true),
        );

        display::print_user(&user);
        println!();
        match students {
            Ok(s) => {
                if let Err(e) = self.cache.save_students(&tenant_id, 1, DASHBOARD_STUDENT_LIMIT, &s) {
                    warn!(error = %e, "Failed to cache students");
                }
                display::print_students(&s);
            }
            Err(e) => println!("Students unavailable: {}", e),
        }
        println!();
        match invitations {
            Ok(i) => {
                let pending: Vec<_> = i.into_iter().filter(|i| i.status.is_actionable()).collect();
                println!("Pending invitations: {}", pending.len());
                display::print_invitations(&pending);
            }
            Err(e) => println!("Invitations unavailable: {}", e),
        }
        println!();
        match templates {
            Ok(t) => {
                println!("Active phase templates: {}", t.len());
                display::print_phase_templates(&t);
            }
            Err(e) => println!("Phase templates unavailable: {}", e),
        }
        Ok(())
    }

    // ===== Students =====

    pub async fn students(&self, page: u32, limit: u32, refresh: bool) -> Result<()> {
        let tenant_id = self.tenant_id().await?;

        if !refresh {
            if let Ok(Some(cached)) = self.cache.load_students(&tenant_id, page, limit) {
                if !cached.is_stale() {
                    display::print_students(&cached.data);
                    println!("(cached {})", cached.age_display());
                    return Ok(());
                }
            }
        }

        let students = self.api.fetch_students(&tenant_id, page, limit).await?;
        if let Err(e) = self.cache.save_students(&tenant_id, page, limit, &students) {
            warn!(error = %e, "Failed to cache students");
        }
        display::print_students(&students);
        Ok(())
    }

    // ===== Invitations =====

    pub async fn invitations(&self, refresh: bool) -> Result<()> {
        let tenant_id = self.tenant_id().await?;

        if !refresh {
            if let Ok(Some(cached)) = self.cache.load_invitations(&tenant_id) {
                if !cached.is_stale() {
                    display::print_invitations(&cached.data);
                    println!("(cached {})", cached.age_display());
                    return Ok(());
                }
            }
        }

        let invitations = self.api.fetch_invitations(&tenant_id).await?;
        if let Err(e) = self.cache.save_invitations(&tenant_id, &invitations) {
            warn!(error = %e, "Failed to cache invitations");
        }
        display::print_invitations(&invitations);
        Ok(())
    }

    pub async fn send_invitation(&self, email: &str) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        self.api.send_invitation(&tenant_id, email).await?;
        self.invalidate(&invitations_key(&tenant_id));
        println!("Invitation sent to {}", email);
        Ok(())
    }

    pub async fn resend_invitation(&self, id: &str) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        self.api.resend_invitation(id).await?;
        self.invalidate(&invitations_key(&tenant_id));
        println!("Invitation resent");
        Ok(())
    }

    pub async fn cancel_invitation(&self, id: &str) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        self.api.cancel_invitation(id).await?;
        self.invalidate(&invitations_key(&tenant_id));
        println!("Invitation cancelled");
        Ok(())
    }

    pub async fn accept_invitation(&self, token: &str, name: String) -> Result<()> {
        let password = prompt_new_password()?;
        self.api
            .accept_invitation(token, &AcceptInvitation { name, password })
            .await?;
        if let Err(e) = self.cache.invalidate_roster() {
            warn!(error = %e, "Failed to invalidate roster queries");
        }
        println!("Invitation accepted. You can now sign in.");
        Ok(())
    }

    // ===== Phase templates =====

    pub async fn phase_templates(&self, active_only: bool, refresh: bool) -> Result<()> {
        let tenant_id = self.tenant_id().await?;

        if !refresh {
            if let Ok(Some(cached)) = self.cache.load_phase_templates(&tenant_id, active_only) {
                if !cached.is_stale() {
                    display::print_phase_templates(&cached.data);
                    println!("(cached {})", cached.age_display());
                    return Ok(());
                }
            }
        }

        let templates = self.api.fetch_phase_templates(&tenant_id, active_only).await?;
        if let Err(e) = self
            .cache
            .save_phase_templates(&tenant_id, active_only, &templates)
        {
            warn!(error = %e, "Failed to cache phase templates");
        }
        display::print_phase_templates(&templates);
        Ok(())
    }

    pub async fn create_phase_template(&self, data: CreatePhaseTemplate) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        let template = self.api.create_phase_template(&tenant_id, &data).await?;
        self.invalidate_templates(&tenant_id);
        println!("Created phase template {} ({})", template.name, template.id);
        Ok(())
    }

    pub async fn update_phase_template(&self, id: &str, data: UpdatePhaseTemplate) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        let template = self.api.update_phase_template(id, &data).await?;
        self.invalidate_templates(&tenant_id);
        println!("Updated phase template {}", template.name);
        Ok(())
    }

    pub async fn delete_phase_template(&self, id: &str) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        self.api.delete_phase_template(id).await?;
        self.invalidate_templates(&tenant_id);
        println!("Deleted phase template {}", id);
        Ok(())
    }

    fn invalidate_templates(&self, tenant_id: &str) {
        // Both the active-only and the full listing change
        for active_only in [true, false] {
            self.invalidate(&phase_templates_key(tenant_id, active_only));
        }
    }

    // ===== Tenant =====

    pub async fn update_tenant(&self, name: &str, description: &str) -> Result<()> {
        let tenant_id = self.tenant_id().await?;
        let tenant = self.api.update_tenant(&tenant_id, name, description).await?;
        println!("Tenant renamed to {}", tenant.name);
        Ok(())
    }

    // ===== Sign-up =====

    pub async fn sign_up(
        &mut self,
        name: String,
        email: String,
        tenant_name: String,
        tenant_description: Option<String>,
    ) -> Result<()> {
        let password = prompt_new_password()?;
        let body = RegisterWithTenant {
            user: NewUser {
                name,
                email: email.clone(),
                password,
            },
            tenant: NewTenant {
                name: tenant_name,
                description: tenant_description.filter(|d| !d.trim().is_empty()),
            },
        };
        self.api.register_with_tenant(&body).await?;

        self.config.last_email = Some(email.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        println!("Account created. Check {} for the verification code.", email);
        Ok(())
    }

    pub async fn verify(&self, code: &str) -> Result<()> {
        self.api.verify_email(code.trim()).await?;
        println!("Email verified. You can now sign in.");
        Ok(())
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last_email) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email is required"),
        (false, _) => Ok(input.to_string()),
    }
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}
