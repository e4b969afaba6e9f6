use std::collections::HashSet;

use tracing::warn;

/// A role authority granting access to role-gated routes.
///
/// Storage keeps roles as a comma-joined string (`"ROLE_ADMIN,ROLE_USER"`)
/// for wire compatibility; this enum is the in-process representation.
/// Parsing happens exactly once, when a user row is loaded — nothing
/// downstream re-splits the raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ROLE_ADMIN",
            Role::User => "ROLE_USER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ROLE_ADMIN" => Some(Role::Admin),
            "ROLE_USER" => Some(Role::User),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma-joined role string into a set of authorities.
///
/// An empty field yields an empty set — there is no implicit default role.
/// Unknown tokens are skipped with a warning; registration validates role
/// names up front, so hitting that path means the row predates this binary.
pub fn parse_role_list(raw: &str) -> HashSet<Role> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match Role::parse(s) {
            Some(role) => Some(role),
            None => {
                warn!("Ignoring unknown role in stored role list: {}", s);
                None
            }
        })
        .collect()
}

/// Join a role set back into its storage form.
pub fn join_role_list(roles: &HashSet<Role>) -> String {
    let mut names: Vec<&str> = roles.iter().map(Role::as_str).collect();
    names.sort_unstable();
    names.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_role() {
        let roles = parse_role_list("ROLE_USER");
        assert_eq!(roles.len(), 1);
        assert!(roles.contains(&Role::User));
    }

    #[test]
    fn parses_comma_joined_roles() {
        let roles = parse_role_list("ROLE_ADMIN,ROLE_USER");
        assert!(roles.contains(&Role::Admin));
        assert!(roles.contains(&Role::User));
        assert_eq!(roles.len(), 2);
    }

    #[test]
    fn trims_whitespace_around_entries() {
        let roles = parse_role_list(" ROLE_ADMIN , ROLE_USER ");
        assert_eq!(roles.len(), 2);
    }

    #[test]
    fn empty_string_yields_empty_set() {
        assert!(parse_role_list("").is_empty());
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let roles = parse_role_list("ROLE_WIZARD,ROLE_USER");
        assert_eq!(roles.len(), 1);
        assert!(roles.contains(&Role::User));
    }

    #[test]
    fn duplicates_collapse() {
        let roles = parse_role_list("ROLE_USER,ROLE_USER");
        assert_eq!(roles.len(), 1);
    }

    #[test]
    fn join_is_stable() {
        let roles = parse_role_list("ROLE_USER,ROLE_ADMIN");
        assert_eq!(join_role_list(&roles), "ROLE_ADMIN,ROLE_USER");
    }
}
