use std::collections::{HashMap, HashSet, VecDeque};

use warden_core::RoleManager;

// ---------------------------------------------------------------------------
// DefaultRoleManager — adjacency-list role graph with domain namespaces
// ---------------------------------------------------------------------------

/// Role-membership graph: per domain, member to the set of directly held
/// roles.
///
/// The implicit (no-domain) namespace is distinct from every named domain;
/// edges added under one domain are invisible to queries under another.
/// Reachability walks breadth-first behind a visited set, so cyclic
/// hierarchies terminate, and depth is bounded only by the graph itself.
#[derive(Debug, Clone, Default)]
pub struct DefaultRoleManager {
    default_graph: HashMap<String, HashSet<String>>,
    domain_graphs: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl DefaultRoleManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn graph(&self, domain: Option<&str>) -> Option<&HashMap<String, HashSet<String>>> {
        match domain {
            None => Some(&self.default_graph),
            Some(name) => self.domain_graphs.get(name),
        }
    }

    fn graph_mut(&mut self, domain: Option<&str>) -> &mut HashMap<String, HashSet<String>> {
        match domain {
            None => &mut self.default_graph,
            Some(name) => self.domain_graphs.entry(name.to_string()).or_default(),
        }
    }
}

impl RoleManager for DefaultRoleManager {
    fn add_link(&mut self, member: &str, role: &str, domain: Option<&str>) {
        self.graph_mut(domain)
            .entry(member.to_string())
            .or_default()
            .insert(role.to_string());
    }

    fn delete_link(&mut self, member: &str, role: &str, domain: Option<&str>) {
        let graph = match domain {
            None => &mut self.default_graph,
            Some(name) => match self.domain_graphs.get_mut(name) {
                Some(graph) => graph,
                None => return,
            },
        };
        if let Some(roles) = graph.get_mut(member) {
            roles.remove(role);
            if roles.is_empty() {
                graph.remove(member);
            }
        }
    }

    fn has_link(&self, member: &str, role: &str, domain: Option<&str>) -> bool {
        if member == role {
            return true;
        }
        let graph = match self.graph(domain) {
            Some(graph) => graph,
            None => return false,
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(member);
        queue.push_back(member);

        while let Some(current) = queue.pop_front() {
            let next = match graph.get(current) {
                Some(next) => next,
                None => continue,
            };
            for candidate in next {
                if candidate == role {
                    return true;
                }
                if visited.insert(candidate) {
                    queue.push_back(candidate);
                }
            }
        }
        false
    }

    fn get_roles(&self, member: &str, domain: Option<&str>) -> Vec<String> {
        let mut roles: Vec<String> = self
            .graph(domain)
            .and_then(|graph| graph.get(member))
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default();
        roles.sort_unstable();
        roles
    }

    fn get_users(&self, role: &str, domain: Option<&str>) -> Vec<String> {
        let mut users: Vec<String> = self
            .graph(domain)
            .map(|graph| {
                graph
                    .iter()
                    .filter(|(_, roles)| roles.contains(role))
                    .map(|(member, _)| member.clone())
                    .collect()
            })
            .unwrap_or_default();
        users.sort_unstable();
        users
    }

    fn clear(&mut self) {
        self.default_graph.clear();
        self.domain_graphs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_has_link() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        assert!(rm.has_link("alice", "admin", None));
        assert!(!rm.has_link("admin", "alice", None));
    }

    #[test]
    fn test_has_link_unrelated_names() {
        let rm = DefaultRoleManager::new();
        assert!(!rm.has_link("nobody", "nothing", None));
    }

    #[test]
    fn test_has_link_reflexive() {
        let rm = DefaultRoleManager::new();
        assert!(rm.has_link("alice", "alice", None));
        assert!(rm.has_link("alice", "alice", Some("domain1")));
    }

    #[test]
    fn test_has_link_transitive() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        rm.add_link("admin", "superadmin", None);
        assert!(rm.has_link("alice", "superadmin", None));
    }

    #[test]
    fn test_has_link_cycle_terminates() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("a", "b", None);
        rm.add_link("b", "a", None);
        assert!(rm.has_link("a", "b", None));
        assert!(rm.has_link("b", "a", None));
        assert!(!rm.has_link("a", "c", None));
    }

    #[test]
    fn test_has_link_deep_chain() {
        let mut rm = DefaultRoleManager::new();
        for i in 0..100 {
            rm.add_link(&format!("role{}", i), &format!("role{}", i + 1), None);
        }
        assert!(rm.has_link("role0", "role100", None));
        assert!(!rm.has_link("role100", "role0", None));
    }

    #[test]
    fn test_add_link_idempotent() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        rm.add_link("alice", "admin", None);
        assert_eq!(rm.get_roles("alice", None), vec!["admin"]);
    }

    #[test]
    fn test_delete_link() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        rm.delete_link("alice", "admin", None);
        assert!(!rm.has_link("alice", "admin", None));
    }

    #[test]
    fn test_delete_link_missing_is_noop() {
        let mut rm = DefaultRoleManager::new();
        rm.delete_link("alice", "admin", None);
        rm.delete_link("alice", "admin", Some("domain1"));
        assert!(!rm.has_link("alice", "admin", None));
    }

    #[test]
    fn test_domain_isolation() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", Some("domain1"));
        assert!(rm.has_link("alice", "admin", Some("domain1")));
        assert!(!rm.has_link("alice", "admin", Some("domain2")));
        assert!(!rm.has_link("alice", "admin", None));
    }

    #[test]
    fn test_implicit_domain_is_separate() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        assert!(!rm.has_link("alice", "admin", Some("domain1")));
    }

    #[test]
    fn test_get_roles_sorted_direct_only() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "writer", None);
        rm.add_link("alice", "reader", None);
        rm.add_link("writer", "admin", None);
        assert_eq!(rm.get_roles("alice", None), vec!["reader", "writer"]);
        assert!(rm.get_roles("unknown", None).is_empty());
    }

    #[test]
    fn test_get_users() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("bob", "admin", None);
        rm.add_link("alice", "admin", None);
        rm.add_link("carol", "reader", None);
        assert_eq!(rm.get_users("admin", None), vec!["alice", "bob"]);
        assert!(rm.get_users("missing", None).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut rm = DefaultRoleManager::new();
        rm.add_link("alice", "admin", None);
        rm.add_link("bob", "admin", Some("domain1"));
        rm.clear();
        assert!(!rm.has_link("alice", "admin", None));
        assert!(!rm.has_link("bob", "admin", Some("domain1")));
    }
}
