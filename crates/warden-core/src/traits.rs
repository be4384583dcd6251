use std::sync::Arc;

use serde_json::Value;

// ---------------------------------------------------------------------------
// RoleManager — domain-scoped role-hierarchy reachability
// ---------------------------------------------------------------------------

/// Role-hierarchy graph interface.
///
/// Implementations answer reachability over directed membership edges,
/// optionally scoped to a domain. The implicit (`None`) domain is a
/// namespace of its own. Names absent from the graph are a normal state:
/// queries return false/empty, never an error.
pub trait RoleManager: Send + Sync {
    /// Adds a membership edge. Inserting an existing edge is a no-op.
    fn add_link(&mut self, member: &str, role: &str, domain: Option<&str>);

    /// Removes a membership edge if present; no-op otherwise.
    fn delete_link(&mut self, member: &str, role: &str, domain: Option<&str>);

    /// True iff `role` is reachable from `member` by following zero or more
    /// edges within the domain. Zero hops count: `member == role` is always
    /// true.
    fn has_link(&self, member: &str, role: &str, domain: Option<&str>) -> bool;

    /// Roles directly held by `member`.
    fn get_roles(&self, member: &str, domain: Option<&str>) -> Vec<String>;

    /// Members directly holding `role`.
    fn get_users(&self, role: &str, domain: Option<&str>) -> Vec<String>;

    /// Drops every edge in every domain.
    fn clear(&mut self);
}

// ---------------------------------------------------------------------------
// MatchingFn — dynamically dispatched matcher function
// ---------------------------------------------------------------------------

/// A named function callable from matcher expressions.
///
/// Receives its positional arguments as JSON values (string, number,
/// boolean, or attribute bag) and reports whether they match. Both the
/// built-in matchers and caller-registered functions share this shape, so
/// lookup by name resolves to one callable interface.
pub type MatchingFn = Arc<dyn Fn(&[Value]) -> bool + Send + Sync>;
