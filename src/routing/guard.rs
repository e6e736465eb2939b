use tracing::debug;

use crate::routing::routes::{self, RouteAccess};
use crate::session::Session;

/// Outcome of a navigation attempt. Each attempt is evaluated on its own;
/// there are no retry semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToRestricted,
}

impl GuardDecision {
    /// Where the navigation actually lands.
    pub fn destination<'a>(&self, requested: &'a str) -> &'a str {
        match self {
            GuardDecision::Allow => requested,
            GuardDecision::RedirectToLogin => routes::LOGIN_ROUTE,
            GuardDecision::RedirectToRestricted => routes::RESTRICTED_ROUTE,
        }
    }
}

/// The decision table:
/// unauthenticated -> login; no declared roles -> allow; role in set ->
/// allow; otherwise -> restricted.
pub fn evaluate(session: Option<&Session>, access: RouteAccess) -> GuardDecision {
    if access == RouteAccess::Public {
        return GuardDecision::Allow;
    }
    let Some(session) = session else {
        return GuardDecision::RedirectToLogin;
    };
    match access {
        RouteAccess::Public | RouteAccess::Authenticated => GuardDecision::Allow,
        RouteAccess::Roles(allowed) => {
            if allowed.contains(&session.role) {
                GuardDecision::Allow
            } else {
                GuardDecision::RedirectToRestricted
            }
        }
    }
}

/// Guard a navigation to `path` for the given session.
pub fn check_route(session: Option<&Session>, path: &str) -> GuardDecision {
    let access = routes::route_access(path);
    let decision = evaluate(session, access);
    debug!("guard: {path} -> {decision:?}");
    decision
}
