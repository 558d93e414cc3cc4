//! Plain-text rendering of dashboard data.

use mentorhub_core::models::{Invitation, PhaseTemplate, StudentsResponse, User};

const NAME_WIDTH: usize = 24;
const EMAIL_WIDTH: usize = 32;

/// Truncate a string to a maximum number of characters, adding an ellipsis
/// if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a backend timestamp as a short date.
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if date.len() >= 10 {
        date.chars().take(10).collect()
    } else {
        date.to_string()
    }
}

pub fn print_user(user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("Role: {}", user.role);
    match user.current_tenant() {
        Some(tenant) => {
            let ownership = if user.owns_tenant(tenant) { " (owner)" } else { "" };
            println!("Tenant: {}{}", tenant.name, ownership);
        }
        None => println!("Tenant: none"),
    }
    println!("Member since {}", format_date(&user.created_at));
}

pub fn print_students(response: &StudentsResponse) {
    if response.students.is_empty() {
        println!("No students yet.");
        return;
    }
    println!(
        "{:<name$}  {:<email$}  {:<8}  {}",
        "NAME",
        "EMAIL",
        "STATUS",
        "JOINED",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    );
    for student in &response.students {
        let status = match (student.is_active, student.is_verified()) {
            (false, _) => "inactive",
            (true, false) => "pending",
            (true, true) => "active",
        };
        println!(
            "{:<name$}  {:<email$}  {:<8}  {}",
            truncate(&student.name, NAME_WIDTH),
            truncate(&student.email, EMAIL_WIDTH),
            status,
            format_date(&student.created_at),
            name = NAME_WIDTH,
            email = EMAIL_WIDTH
        );
    }
    let p = &response.pagination;
    print!("Page {} of {} ({} students)", p.page, p.total_pages.max(1), p.total);
    if p.has_next() {
        print!(", next: --page {}", p.page + 1);
    }
    println!();
}

pub fn print_invitations(invitations: &[Invitation]) {
    if invitations.is_empty() {
        println!("No invitations.");
        return;
    }
    for invitation in invitations {
        println!(
            "{:<email$}  {:<9}  expires {}  [{}]",
            truncate(&invitation.email, EMAIL_WIDTH),
            invitation.status,
            format_date(&invitation.expires_at),
            invitation.id,
            email = EMAIL_WIDTH
        );
    }
}

pub fn print_phase_templates(templates: &[PhaseTemplate]) {
    if templates.is_empty() {
        println!("No phase templates.");
        return;
    }
    let mut sorted: Vec<&PhaseTemplate> = templates.iter().collect();
    sorted.sort_by_key(|t| t.default_order);
    for template in sorted {
        let days = template
            .suggested_duration_days
            .map(|d| format!("{}d", d))
            .unwrap_or_else(|| "-".to_string());
        let active = if template.is_active { "" } else { " (inactive)" };
        println!(
            "{:>3}. {:<name$}  {:>4}  {}{}  [{}]",
            template.default_order,
            truncate(&template.name, NAME_WIDTH),
            days,
            truncate(&template.purpose, 40),
            active,
            template.id,
            name = NAME_WIDTH
        );
    }
}
