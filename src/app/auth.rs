//! Bearer-token bookkeeping for the secure routes.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Two token sets: every registered token is authenticated, admin tokens
/// are also authorized.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    authenticated: RwLock<HashSet<String>>,
    authorized: RwLock<HashSet<String>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_token(&self, token: impl Into<String>, is_admin: bool) {
        let token = token.into();
        if is_admin {
            self.authorized.write().insert(token.clone());
        }
        self.authenticated.write().insert(token);
    }

    /// Mints a fresh token and registers it.
    pub fn issue_token(&self, is_admin: bool) -> String {
        let token = ulid::Ulid::new().to_string();
        self.register_token(token.clone(), is_admin);
        token
    }

    pub fn is_authenticated(&self, token: &str) -> bool {
        self.authenticated.read().contains(token)
    }

    pub fn is_authorized(&self, token: &str) -> bool {
        self.authorized.read().contains(token)
    }

    pub fn is_admin(&self, token: &str) -> bool {
        self.is_authorized(token)
    }
}
