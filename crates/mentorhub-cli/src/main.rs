//! mentorhub - command-line dashboard for the mentorhub mentoring platform.
//!
//! Signs in against the backend, keeps the Credential Pair in the profile
//! cookie jar and gives mentors access to their students, invitations and
//! phase templates from the terminal.

mod app;
mod display;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mentorhub_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "mentorhub")]
#[command(about = "Mentoring dashboard for the terminal")]
#[command(version)]
struct Cli {
    /// Backend URL, overriding config and MENTORHUB_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Tenant to operate on, overriding the signed-in user's first tenant
    #[arg(long, global = true)]
    tenant: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with email and password
    SignIn {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget cached data
    SignOut,
    /// Show the signed-in user
    Whoami,
    /// Follow the session and exit when it is signed out anywhere
    Watch,
    /// Students, invitations and templates at a glance
    Dashboard,
    /// List students of the tenant
    Students {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = mentorhub_core::api::DEFAULT_PAGE_LIMIT)]
        limit: u32,
        /// Skip the local cache
        #[arg(long)]
        refresh: bool,
    },
    /// Manage student invitations
    #[command(subcommand)]
    Invitations(InvitationCommand),
    /// Manage phase templates
    #[command(subcommand)]
    Templates(TemplateCommand),
    /// Manage the tenant
    #[command(subcommand)]
    Tenant(TenantCommand),
    /// Create an account together with a new tenant
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        tenant_name: String,
        #[arg(long)]
        tenant_description: Option<String>,
    },
    /// Confirm an account with the emailed code
    Verify { code: String },
    /// Show where a dashboard route would lead with the current session
    Route { path: String },
}

#[derive(Debug, Subcommand)]
enum InvitationCommand {
    List {
        #[arg(long)]
        refresh: bool,
    },
    Send { email: String },
    Resend { id: String },
    Cancel { id: String },
    /// Accept an invitation and create the student account
    Accept {
        token: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    List {
        #[arg(long)]
        active_only: bool,
        #[arg(long)]
        refresh: bool,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        order: i32,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        duration_days: Option<u32>,
        #[arg(long)]
        min_accuracy: Option<f64>,
        #[arg(long)]
        min_completion: Option<f64>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        order: Option<i32>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        duration_days: Option<u32>,
        #[arg(long)]
        min_accuracy: Option<f64>,
        #[arg(long)]
        min_completion: Option<f64>,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum TenantCommand {
    Update {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

// ============================================================================
// Logging
// ============================================================================

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Logs go to stderr and,
/// when the cache directory is available, to a daily log file. The returned
/// guard must live until exit so buffered file output is flushed.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = Config::default().cache_dir().ok().map(|d| d.join("logs"));
    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "mentorhub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("mentorhub starting");

    let mut app = App::new(cli.base_url.as_deref(), cli.tenant)?;
    let result = run(&mut app, cli.command).await;

    info!("mentorhub exiting");
    result
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::SignIn { email } => app.sign_in(email).await,
        Command::SignOut => app.sign_out().await,
        Command::Whoami => app.whoami().await,
        Command::Watch => app.watch().await,
        Command::Dashboard => app.dashboard().await,
        Command::Students {
            page,
            limit,
            refresh,
        } => app.students(page, limit, refresh).await,
        Command::Invitations(cmd) => match cmd {
            InvitationCommand::List { refresh } => app.invitations(refresh).await,
            InvitationCommand::Send { email } => app.send_invitation(&email).await,
            InvitationCommand::Resend { id } => app.resend_invitation(&id).await,
            InvitationCommand::Cancel { id } => app.cancel_invitation(&id).await,
            InvitationCommand::Accept { token, name } => app.accept_invitation(&token, name).await,
        },
        Command::Templates(cmd) => match cmd {
            TemplateCommand::List {
                active_only,
                refresh,
            } => app.phase_templates(active_only, refresh).await,
            TemplateCommand::Create {
                name,
                purpose,
                order,
                description,
                duration_days,
                min_accuracy,
                min_completion,
            } => {
                app.create_phase_template(mentorhub_core::models::CreatePhaseTemplate {
                    name,
                    description,
                    purpose,
                    default_order: order,
                    suggested_duration_days: duration_days,
                    default_min_accuracy: min_accuracy,
                    default_min_completion: min_completion,
                })
                .await
            }
            TemplateCommand::Update {
                id,
                name,
                purpose,
                order,
                description,
                active,
                duration_days,
                min_accuracy,
                min_completion,
            } => {
                app.update_phase_template(
                    &id,
                    mentorhub_core::models::UpdatePhaseTemplate {
                        name,
                        description,
                        purpose,
                        default_order: order,
                        is_active: active,
                        suggested_duration_days: duration_days,
                        default_min_accuracy: min_accuracy,
                        default_min_completion: min_completion,
                    },
                )
                .await
            }
            TemplateCommand::Delete { id } => app.delete_phase_template(&id).await,
        },
        Command::Tenant(TenantCommand::Update { name, description }) => {
            app.update_tenant(&name, &description).await
        }
        Command::SignUp {
            name,
            email,
            tenant_name,
            tenant_description,
        } => app.sign_up(name, email, tenant_name, tenant_description).await,
        Command::Verify { code } => app.verify(&code).await,
        Command::Route { path } => {
            app.route(&path);
            Ok(())
        }
    }
}
