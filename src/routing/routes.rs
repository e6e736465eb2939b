use crate::models::Role;

/// Who may enter a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// No session needed.
    Public,
    /// Any authenticated role.
    Authenticated,
    /// Authenticated, and the session role must be in the set.
    Roles(&'static [Role]),
}

pub const LOGIN_ROUTE: &str = "/login";
pub const RESTRICTED_ROUTE: &str = "/restricted";

/// Navigation table: the four role-gated subtrees plus the guest pages.
/// Longest matching prefix wins.
const ROUTES: &[(&str, RouteAccess)] = &[
    ("/login", RouteAccess::Public),
    ("/register", RouteAccess::Public),
    ("/homePage", RouteAccess::Public),
    ("/restricted", RouteAccess::Public),
    ("/admin", RouteAccess::Roles(&[Role::Admin])),
    ("/patient", RouteAccess::Roles(&[Role::Patient])),
    ("/caregiver", RouteAccess::Roles(&[Role::Caregiver])),
    ("/provider", RouteAccess::Roles(&[Role::Provider])),
];

/// Resolve the access declaration for a path. Paths outside the table are
/// reachable by any authenticated role.
pub fn route_access(path: &str) -> RouteAccess {
    ROUTES
        .iter()
        .filter(|(prefix, _)| {
            path == *prefix
                || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'/'))
        })
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, access)| *access)
        .unwrap_or(RouteAccess::Authenticated)
}

/// Landing route for a freshly authenticated role.
pub fn home_route(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin/dashboard",
        Role::Patient => "/patient/home",
        Role::Caregiver => "/caregiver/home",
        Role::Provider => "/provider/home",
    }
}
