//! Route names and the token-presence guard for private routes.

use std::sync::Mutex;

use tracing::info;

pub const ROOT_ROUTE: &str = "/";
pub const SIGN_IN_ROUTE: &str = "/auth/sign-in";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Moves the front end to another route.
pub trait Navigator: Send + Sync {
    fn push(&self, route: &str);
}

/// Navigator for front ends without a router; it only records the request.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn push(&self, route: &str) {
        info!(route, "Navigate");
    }
}

/// Navigator that remembers every route it was sent to.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.routes().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, route: &str) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route.to_string());
        }
    }
}

/// What to do with a request for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Redirect(&'static str),
}

/// Gate private routes on the presence of an access token.
///
/// The sign-in page bounces signed-in users to the dashboard; everything
/// under `/dashboard` requires a token. Other routes are not guarded.
pub fn route_decision(path: &str, has_token: bool) -> RouteDecision {
    if path == SIGN_IN_ROUTE {
        return if has_token {
            RouteDecision::Redirect(DASHBOARD_ROUTE)
        } else {
            RouteDecision::Continue
        };
    }

    let private = path == DASHBOARD_ROUTE || path.starts_with("/dashboard/");
    if private && !has_token {
        RouteDecision::Redirect(SIGN_IN_ROUTE)
    } else {
        RouteDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_page() {
        assert_eq!(route_decision(SIGN_IN_ROUTE, false), RouteDecision::Continue);
        assert_eq!(
            route_decision(SIGN_IN_ROUTE, true),
            RouteDecision::Redirect(DASHBOARD_ROUTE)
        );
    }

    #[test]
    fn test_dashboard_requires_token() {
        assert_eq!(
            route_decision("/dashboard", false),
            RouteDecision::Redirect(SIGN_IN_ROUTE)
        );
        assert_eq!(
            route_decision("/dashboard/mentor/students", false),
            RouteDecision::Redirect(SIGN_IN_ROUTE)
        );
        assert_eq!(route_decision("/dashboard/student", true), RouteDecision::Continue);
    }

    #[test]
    fn test_public_routes_pass() {
        assert_eq!(route_decision("/accept-invitation", false), RouteDecision::Continue);
        assert_eq!(route_decision("/dashboards-info", false), RouteDecision::Continue);
        assert_eq!(route_decision(ROOT_ROUTE, false), RouteDecision::Continue);
    }

    #[test]
    fn test_recording_navigator() {
        let nav = RecordingNavigator::new();
        nav.push(ROOT_ROUTE);
        nav.push(SIGN_IN_ROUTE);
        assert_eq!(nav.routes(), vec![ROOT_ROUTE.to_string(), SIGN_IN_ROUTE.to_string()]);
        assert_eq!(nav.last().as_deref(), Some(SIGN_IN_ROUTE));
    }
}
