//! Local permission evaluation over cached grants.
//!
//! Permissions are `resource:action` strings. A grant may wildcard either
//! side with `*`. Evaluation is purely local and fails closed: anything
//! malformed denies.

use std::collections::HashSet;

/// Split a permission string into its resource and action halves.
///
/// Returns `None` for anything that is not exactly `resource:action` with
/// both halves non-empty.
fn split_permission(permission: &str) -> Option<(&str, &str)> {
    let mut parts = permission.splitn(2, ':');
    let resource = parts.next()?;
    let action = parts.next()?;
    if resource.is_empty() || action.is_empty() || action.contains(':') {
        return None;
    }
    Some((resource, action))
}

/// Whether a single grant satisfies a query.
fn grant_matches(grant: &str, resource: &str, action: &str) -> bool {
    match split_permission(grant) {
        Some((granted_resource, granted_action)) => {
            (granted_resource == resource || granted_resource == "*")
                && (granted_action == action || granted_action == "*")
        }
        None => false,
    }
}

/// Whether the cached grants satisfy `query`.
///
/// Wildcards live only on the grant side; a query containing `*` is just a
/// literal that no well-formed grant will produce.
pub fn has_permission(grants: &HashSet<String>, query: &str) -> bool {
    let Some((resource, action)) = split_permission(query) else {
        return false;
    };
    grants
        .iter()
        .any(|grant| grant_matches(grant, resource, action))
}

/// Whether at least one of `queries` is satisfied. Empty input denies.
pub fn has_any_permission(grants: &HashSet<String>, queries: &[&str]) -> bool {
    queries.iter().any(|query| has_permission(grants, query))
}

/// Whether every one of `queries` is satisfied. Empty input grants.
pub fn has_all_permissions(grants: &HashSet<String>, queries: &[&str]) -> bool {
    queries.iter().all(|query| has_permission(grants, query))
}

/// Case-sensitive membership test against the principal's role names.
pub fn has_role(role_names: &[String], role: &str) -> bool {
    role_names.iter().any(|name| name == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_grant_set_denies_everything() {
        let g = grants(&[]);
        assert!(!has_permission(&g, "documents:read"));
        assert!(!has_permission(&g, "*:*"));
    }

    #[test]
    fn exact_grant_matches() {
        let g = grants(&["documents:read", "documents:write"]);
        assert!(has_permission(&g, "documents:read"));
        assert!(!has_permission(&g, "documents:delete"));
        assert!(!has_permission(&g, "reports:read"));
    }

    #[test]
    fn action_wildcard_covers_every_action() {
        let g = grants(&["documents:*"]);
        assert!(has_permission(&g, "documents:read"));
        assert!(has_permission(&g, "documents:delete"));
        assert!(!has_permission(&g, "reports:read"));
    }

    #[test]
    fn resource_wildcard_covers_every_resource() {
        let g = grants(&["*:read"]);
        assert!(has_permission(&g, "documents:read"));
        assert!(has_permission(&g, "reports:read"));
        assert!(!has_permission(&g, "documents:write"));
    }

    #[test]
    fn full_wildcard_grants_everything_well_formed() {
        let g = grants(&["*:*"]);
        assert!(has_permission(&g, "anything:at_all"));
        assert!(!has_permission(&g, "no-colon"));
    }

    #[test]
    fn malformed_queries_deny() {
        let g = grants(&["documents:read"]);
        assert!(!has_permission(&g, ""));
        assert!(!has_permission(&g, "documents"));
        assert!(!has_permission(&g, "documents:"));
        assert!(!has_permission(&g, ":read"));
        assert!(!has_permission(&g, "documents:read:extra"));
    }

    #[test]
    fn malformed_grants_are_ignored() {
        let g = grants(&["broken", "documents:read"]);
        assert!(has_permission(&g, "documents:read"));
        assert!(!has_permission(&g, "broken:anything"));
    }

    #[test]
    fn wildcard_in_query_is_literal() {
        let g = grants(&["documents:read"]);
        assert!(!has_permission(&g, "documents:*"));
        assert!(!has_permission(&g, "*:*"));
    }

    #[test]
    fn any_and_all_combinators() {
        let g = grants(&["documents:read"]);
        assert!(has_any_permission(&g, &["reports:read", "documents:read"]));
        assert!(!has_any_permission(&g, &[]));
        assert!(has_all_permissions(&g, &["documents:read"]));
        assert!(!has_all_permissions(&g, &["documents:read", "reports:read"]));
        assert!(has_all_permissions(&g, &[]));
    }

    #[test]
    fn role_membership_is_case_sensitive() {
        let roles = vec!["admin".to_string(), "Editor".to_string()];
        assert!(has_role(&roles, "admin"));
        assert!(has_role(&roles, "Editor"));
        assert!(!has_role(&roles, "Admin"));
        assert!(!has_role(&roles, "viewer"));
    }
}
