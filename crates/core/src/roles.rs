//! Organization role names.
//!
//! Roles arrive in the JWT claims issued by the external identity service;
//! this module only pins down the strings so the RBAC extractors and tests
//! agree on them.

/// Organization administrator: full access, may force-release edit locks.
pub const ROLE_ADMIN: &str = "admin";

/// Regular member: may create and edit documents.
pub const ROLE_EDITOR: &str = "editor";

/// Read-only member.
pub const ROLE_VIEWER: &str = "viewer";

/// All roles recognized by the API layer.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_EDITOR, ROLE_VIEWER];

/// Returns `true` if the given role name is recognized.
pub fn is_valid_role(role: &str) -> bool {
    VALID_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_are_valid() {
        assert!(is_valid_role("admin"));
        assert!(is_valid_role("editor"));
        assert!(is_valid_role("viewer"));
    }

    #[test]
    fn unknown_roles_are_invalid() {
        assert!(!is_valid_role(""));
        assert!(!is_valid_role("owner"));
        assert!(!is_valid_role("Admin"));
    }
}
