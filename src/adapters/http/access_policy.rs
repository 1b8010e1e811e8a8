//! Path-based access rules applied before any handler runs.
//!
//! Rules are evaluated top to bottom and the first match wins. Patterns are
//! `/`-separated: a literal segment matches itself, `{name}` and `*` match
//! exactly one segment, and a trailing `**` matches zero or more segments.

use axum::http::Method;

use crate::domain::entities::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    AnyRole(&'static [Role]),
}

impl Access {
    /// Whether a caller holding `role` satisfies this rule. Public and
    /// authenticated rules accept every role.
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::AnyRole(roles) => roles.contains(&role),
        }
    }
}

/// Rules apply to every HTTP method.
struct Rule {
    pattern: &'static str,
    access: Access,
}

const ADMIN: Access = Access::AnyRole(&[Role::Admin]);
const STAFF: Access = Access::AnyRole(&[Role::Teacher, Role::Admin]);

const fn rule(pattern: &'static str, access: Access) -> Rule {
    Rule { pattern, access }
}

static RULES: &[Rule] = &[
    // public
    rule("/api/users/register", Access::Public),
    rule("/api/users/login", Access::Public),
    rule("/api/otp/**", Access::Public),
    rule("/api/auth/**", Access::Public),
    rule("/api/payment/vnpay/return", Access::Public),
    rule("/api/payment/vnpay/callback", Access::Public),
    rule("/api/policies", Access::Public),
    rule("/api/policies/{id}", Access::Public),
    rule("/api/study-packs", Access::Public),
    rule("/api/study-packs/{id}", Access::Public),
    rule("/api/flashcards", Access::Public),
    rule("/api/flashcards/{id}", Access::Public),
    rule("/api/flashcards/category/**", Access::Public),
    rule("/api/flashcards/random", Access::Public),
    rule("/api/flashcards/search", Access::Public),
    rule("/api/flashcards/ai/**", Access::Public),
    // admin
    rule("/api/admin/**", ADMIN),
    rule("/api/users/admin/**", ADMIN),
    rule("/api/policies/admin/**", ADMIN),
    rule("/api/flashcards/admin/**", ADMIN),
    rule("/api/study-packs/admin/**", ADMIN),
    // signed in
    rule("/api/payment/**", Access::Authenticated),
    rule("/api/users/profile", Access::Authenticated),
    rule("/api/users/change-password", Access::Authenticated),
    rule("/api/users/{id}", Access::Authenticated),
    rule("/api/users/email/**", Access::Authenticated),
    rule("/api/users/{id}/profile", Access::Authenticated),
    rule("/api/users/delete", Access::Authenticated),
    // class membership, specific patterns first
    rule("/api/classes/{classId}/members/pending", STAFF),
    rule("/api/classes/{classId}/members/{userId}/approve", STAFF),
    rule("/api/classes/{classId}/members/{userId}/reject", STAFF),
    rule("/api/classes/{classId}/members/add", STAFF),
    rule("/api/classes/{classId}/members/{userId}", STAFF),
    rule("/api/classes/*/members", Access::Authenticated),
    // class management
    rule("/api/classes/create", STAFF),
    rule("/api/classes/my-classes", STAFF),
    rule("/api/classes/{id}/update", STAFF),
    rule("/api/classes/{id}/delete", STAFF),
    rule("/api/classes/{id}/regenerate-invite-code", STAFF),
    rule("/api/classes/{id}/category-count", STAFF),
    rule("/api/classes/admin/**", ADMIN),
    rule("/api/classes/by-invite-code/**", Access::Public),
    rule("/api/classes/{id}", Access::Authenticated),
    rule("/api/classes/search", Access::Authenticated),
    rule("/api/classes/{id}/membership-status", Access::Authenticated),
    rule("/api/classes/join", Access::Authenticated),
    rule("/api/classes/{id}/join", Access::Authenticated),
    rule("/api/classes/{id}/leave", Access::Authenticated),
    rule("/api/classes/joined", Access::Authenticated),
    rule("/api/categories/**", Access::Authenticated),
    rule("/audio/**", Access::Public),
];

/// Access required for a request to `path`. CORS preflight is always public;
/// unmatched paths require authentication.
pub fn access_for(method: &Method, path: &str) -> Access {
    if method == Method::OPTIONS {
        return Access::Public;
    }
    RULES
        .iter()
        .find(|rule| path_matches(rule.pattern, path))
        .map(|rule| rule.access)
        .unwrap_or(Access::Authenticated)
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = segments(pattern).collect();
    let path: Vec<&str> = segments(path).collect();

    for (i, seg) in pattern.iter().enumerate() {
        if *seg == "**" && i == pattern.len() - 1 {
            return path.len() >= i;
        }
        match path.get(i) {
            None => return false,
            Some(actual) if is_wildcard(seg) || seg == actual => {}
            Some(_) => return false,
        }
    }
    pattern.len() == path.len()
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|seg| !seg.is_empty())
}

fn is_wildcard(seg: &str) -> bool {
    seg == "*" || (seg.starts_with('{') && seg.ends_with('}'))
}
