//! Routes that bypass credential checks.
//!
//! The table is consulted before any header is looked at. Matching is a pure
//! function of method and path.

use axum::http::Method;

use crate::uploads::PUBLIC_PATH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// The path must equal this string
    Exact(String),
    /// The path must equal this string or continue it with `/...`
    Prefix(String),
}

impl PathPattern {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllowRule {
    pub pattern: PathPattern,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    rules: Vec<AllowRule>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, pattern: PathPattern, methods: &[Method]) -> Self {
        self.rules.push(AllowRule {
            pattern,
            methods: methods.to_vec(),
        });
        self
    }

    /// Public routes of the shop, mounted under `prefix` (e.g. `/api/v1`)
    pub fn default_for(prefix: &str) -> Self {
        let read = [Method::GET, Method::OPTIONS];
        Self::new()
            .allow(PathPattern::Prefix(PUBLIC_PATH.to_string()), &read)
            .allow(PathPattern::Prefix(format!("{}/products", prefix)), &read)
            .allow(PathPattern::Prefix(format!("{}/categories", prefix)), &read)
            .allow(PathPattern::Exact(format!("{}/users/login", prefix)), &[Method::POST])
            .allow(PathPattern::Exact(format!("{}/users/register", prefix)), &[Method::POST])
            .allow(PathPattern::Exact("/health".to_string()), &[Method::GET])
    }

    pub fn is_allowed(&self, method: &Method, path: &str) -> bool {
        // "/products/" and "/products" are the same route
        let path = match path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => path,
        };

        self.rules
            .iter()
            .any(|rule| rule.methods.contains(method) && rule.pattern.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> AllowList {
        AllowList::default_for("/api/v1")
    }

    #[test]
    fn catalog_reads_are_public() {
        let list = list();
        assert!(list.is_allowed(&Method::GET, "/api/v1/products"));
        assert!(list.is_allowed(&Method::GET, "/api/v1/products/"));
        assert!(list.is_allowed(&Method::GET, "/api/v1/products/get/featured/3"));
        assert!(list.is_allowed(&Method::OPTIONS, "/api/v1/categories/abc"));
        assert!(list.is_allowed(&Method::GET, "/public/uploads/shoe-1.png"));
    }

    #[test]
    fn catalog_writes_are_gated() {
        let list = list();
        assert!(!list.is_allowed(&Method::POST, "/api/v1/products"));
        assert!(!list.is_allowed(&Method::PUT, "/api/v1/categories/abc"));
        assert!(!list.is_allowed(&Method::DELETE, "/api/v1/products/abc"));
        assert!(!list.is_allowed(&Method::POST, "/public/uploads/x.png"));
    }

    #[test]
    fn prefix_matches_whole_segments_only() {
        let list = list();
        assert!(!list.is_allowed(&Method::GET, "/api/v1/productsecret"));
        assert!(!list.is_allowed(&Method::GET, "/api/v1/categories-admin"));
        assert!(!list.is_allowed(&Method::GET, "/api/v1"));
    }

    #[test]
    fn login_and_register_are_post_only() {
        let list = list();
        assert!(list.is_allowed(&Method::POST, "/api/v1/users/login"));
        assert!(list.is_allowed(&Method::POST, "/api/v1/users/register"));
        assert!(!list.is_allowed(&Method::GET, "/api/v1/users/login"));
        assert!(!list.is_allowed(&Method::POST, "/api/v1/users"));
        assert!(!list.is_allowed(&Method::POST, "/api/v1/users/login/extra"));
    }

    #[test]
    fn orders_are_never_public() {
        let list = list();
        for method in [Method::GET, Method::POST, Method::PUT, Method::DELETE] {
            assert!(!list.is_allowed(&method, "/api/v1/orders"));
            assert!(!list.is_allowed(&method, "/api/v1/orders/get/count"));
        }
    }

    #[test]
    fn health_is_public() {
        assert!(list().is_allowed(&Method::GET, "/health"));
    }
}
